//! Job telemetry analyzer
//!
//! Decodes a job's vertex-plan and runtime-statistics XML documents, ranks
//! vertices across several dimensions, correlates runtime operators with
//! their plan definitions and renders the findings as Markdown or JSON.

pub mod config;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::job_analyzer::{JobAnalysis, JobDocuments, ReportFormatter, analyze, load_documents};
pub use utils::{AnalyzerError, AnalyzerResult};
