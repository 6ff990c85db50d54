//! Job analyzer module
//!
//! Ranking, anomaly scan, plan scoring and cross-document correlation over
//! the built graphs. Every routine here is pure and borrows its input.

pub mod anomaly;
pub mod correlator;
pub mod plan_scorer;
pub mod ranker;
pub mod top_k;

pub use anomaly::AnomalyDetector;
pub use correlator::OperatorCorrelator;
pub use plan_scorer::PlanScorer;
pub use ranker::VertexRanker;
pub use top_k::top_k;
