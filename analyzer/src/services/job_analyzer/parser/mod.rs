//! Telemetry document parser module
//!
//! Decodes XML and builds the runtime and plan graphs.

pub mod core;
pub mod document;
pub mod plan_builder;
pub mod runtime_builder;

// Re-export commonly used items
pub use document::{DocumentKind, JobDocument};
pub use plan_builder::PlanGraphBuilder;
pub use runtime_builder::RuntimeGraphBuilder;
