//! Job Telemetry Analyzer
//!
//! Turns a job's vertex-plan and runtime-statistics XML documents into ranked,
//! cross-referenced bottleneck views and a Markdown report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        analyze()                             │
//! │                                                              │
//! │  bytes ─▶ XmlDecoder ─▶ RuntimeGraphBuilder ─▶ VertexRanker  │
//! │                │                                   │         │
//! │                └──────▶ PlanGraphBuilder           ▼         │
//! │                               │          OperatorCorrelator  │
//! │                               └──────────────────▶ │         │
//! │                                                    ▼         │
//! │                                           ReportFormatter    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure in one document never stops analysis of the other; the result
//! records each document's load status instead.
//!
//! # Usage
//!
//! ```ignore
//! use job_insight::services::job_analyzer::{analyze, load_documents, ReportFormatter};
//!
//! let docs = load_documents(Some(plan_path), Some(runtime_path), &config.analysis).await;
//! let analysis = analyze(&docs, &config.analysis);
//! println!("{}", ReportFormatter::new(config.analysis.time_unit).render(&analysis));
//! ```

pub mod analyzer;
pub mod models;
pub mod parser;
pub mod report;


pub use analyzer::{OperatorCorrelator, PlanScorer, VertexRanker};
pub use models::*;
pub use parser::{DocumentKind, JobDocument, PlanGraphBuilder, RuntimeGraphBuilder};
pub use report::ReportFormatter;

use crate::config::AnalysisConfig;
use crate::utils::{AnalyzerError, AnalyzerResult};
use std::path::{Path, PathBuf};

/// Outcome of loading one document
#[derive(Debug)]
pub enum DocumentSlot<T> {
    Loaded(T),
    NotProvided,
    Failed(AnalyzerError),
}

impl<T> Default for DocumentSlot<T> {
    fn default() -> Self {
        DocumentSlot::NotProvided
    }
}

impl<T> DocumentSlot<T> {
    fn from_result(result: AnalyzerResult<T>, kind: DocumentKind) -> Self {
        match result {
            Ok(graph) => DocumentSlot::Loaded(graph),
            Err(e) => {
                tracing::warn!("Failed to load {} document: {}", kind.label(), e);
                DocumentSlot::Failed(e)
            },
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            DocumentSlot::Loaded(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn status(&self) -> DocumentStatus {
        match self {
            DocumentSlot::Loaded(_) => DocumentStatus::Loaded,
            DocumentSlot::NotProvided => DocumentStatus::NotProvided,
            DocumentSlot::Failed(e) => DocumentStatus::Failed(e.to_string()),
        }
    }
}

/// The built graphs of one job, each independently optional
#[derive(Debug, Default)]
pub struct JobDocuments {
    pub plan: DocumentSlot<PlanGraph>,
    pub runtime: DocumentSlot<RuntimeGraph>,
    /// Where each slot's document came from, when read from disk
    pub plan_path: Option<PathBuf>,
    pub runtime_path: Option<PathBuf>,
    /// Documents of undetected kind that could not be placed in a slot
    pub rejected: Vec<RejectedDocument>,
}

impl JobDocuments {
    /// Build both graphs from in-memory documents
    pub fn from_bytes(plan: Option<&[u8]>, runtime: Option<&[u8]>, config: &AnalysisConfig) -> Self {
        let plan = match plan {
            Some(bytes) => DocumentSlot::from_result(PlanGraphBuilder::from_bytes(bytes), DocumentKind::Plan),
            None => DocumentSlot::NotProvided,
        };
        let runtime = match runtime {
            Some(bytes) => DocumentSlot::from_result(
                RuntimeGraphBuilder::from_bytes(bytes, &config.vertex_id_prefix),
                DocumentKind::Runtime,
            ),
            None => DocumentSlot::NotProvided,
        };
        Self { plan, runtime, ..Default::default() }
    }

    /// Place a built document in its slot, replacing what was there
    pub fn with_document(mut self, document: JobDocument) -> Self {
        match document {
            JobDocument::Plan(graph) => self.plan = DocumentSlot::Loaded(graph),
            JobDocument::Runtime(graph) => self.runtime = DocumentSlot::Loaded(graph),
        }
        self
    }

    /// Sniff the kind of a document and place it in its slot
    pub fn with_detected(self, bytes: &[u8], config: &AnalysisConfig) -> AnalyzerResult<Self> {
        let document = JobDocument::parse_detected(bytes, &config.vertex_id_prefix)?;
        tracing::info!("Detected {} document", document.kind().label());
        Ok(self.with_document(document))
    }

    /// Read documents of unknown kind and place each in its slot
    ///
    /// Files are read and parsed concurrently. A file that cannot be read,
    /// parsed or classified is recorded in `rejected` and leaves the slots
    /// untouched. When two files have the same kind, the later one wins.
    pub async fn load_detected(mut self, paths: &[PathBuf], config: &AnalysisConfig) -> Self {
        let tasks: Vec<_> = paths
            .iter()
            .map(|path| {
                let path = path.clone();
                let prefix = config.vertex_id_prefix.clone();
                tokio::spawn(async move {
                    let bytes = tokio::fs::read(&path).await.map_err(|e| AnalyzerError::io(&path, e))?;
                    JobDocument::parse_detected(&bytes, &prefix)
                })
            })
            .collect();

        for (path, task) in paths.iter().zip(tasks) {
            let result = task
                .await
                .unwrap_or_else(|e| Err(AnalyzerError::io(path, std::io::Error::other(e))));
            match result {
                Ok(document) => {
                    tracing::info!("Detected {} document in {}", document.kind().label(), path.display());
                    match document.kind() {
                        DocumentKind::Plan => self.plan_path = Some(path.clone()),
                        DocumentKind::Runtime => self.runtime_path = Some(path.clone()),
                    }
                    self = self.with_document(document);
                },
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    self.rejected.push(RejectedDocument { path: path.display().to_string(), reason: e.to_string() });
                },
            }
        }
        self
    }
}

/// Read and build both documents
///
/// The two files are read concurrently; each read or parse failure only
/// affects its own slot.
pub async fn load_documents(
    plan_path: Option<&Path>,
    runtime_path: Option<&Path>,
    config: &AnalysisConfig,
) -> JobDocuments {
    let (plan_bytes, runtime_bytes) = tokio::join!(read_optional(plan_path), read_optional(runtime_path));

    let plan = match plan_bytes {
        None => DocumentSlot::NotProvided,
        Some(read) => DocumentSlot::from_result(
            read.and_then(|bytes| PlanGraphBuilder::from_bytes(&bytes)),
            DocumentKind::Plan,
        ),
    };
    let runtime = match runtime_bytes {
        None => DocumentSlot::NotProvided,
        Some(read) => DocumentSlot::from_result(
            read.and_then(|bytes| RuntimeGraphBuilder::from_bytes(&bytes, &config.vertex_id_prefix)),
            DocumentKind::Runtime,
        ),
    };

    JobDocuments {
        plan,
        runtime,
        plan_path: plan_path.map(Path::to_path_buf),
        runtime_path: runtime_path.map(Path::to_path_buf),
        rejected: Vec::new(),
    }
}

/// Read a whole file, None when no path was given
pub async fn read_optional(path: Option<&Path>) -> Option<AnalyzerResult<Vec<u8>>> {
    let path = path?;
    tracing::debug!("Reading {}", path.display());
    Some(tokio::fs::read(path).await.map_err(|e| AnalyzerError::io(path, e)))
}

/// Analyze the loaded documents
///
/// Runtime views come from the runtime graph; their operators are then
/// correlated against the plan graph. Without surfaced operators the detail
/// section falls back to plan-only vertex scoring.
pub fn analyze<'a>(docs: &'a JobDocuments, config: &AnalysisConfig) -> JobAnalysis<'a> {
    let runtime = docs.runtime.loaded();
    let plan = docs.plan.loaded();

    let vertices = runtime.map(|g| g.vertices.as_slice()).unwrap_or_default();
    let ranking = VertexRanker::rank(vertices, config);

    let plan_bottlenecks =
        plan.map(|p| PlanScorer::top_vertices(&p.vertices, config.top_n)).unwrap_or_default();

    let operators = OperatorCorrelator::collect_operators(&ranking);
    let operator_detail = OperatorCorrelator::correlate(plan, &operators, config.top_n);

    tracing::info!(
        "Analyzed job: {} runtime vertices, {} plan vertices, {} operators surfaced",
        ranking.totals.vertex_count,
        plan.map(|p| p.vertices.len()).unwrap_or(0),
        operators.len()
    );

    JobAnalysis {
        runtime_status: docs.runtime.status(),
        plan_status: docs.plan.status(),
        runtime_discovery: runtime.map(|g| g.discovery),
        plan_vertex_count: plan.map(|p| p.vertices.len()).unwrap_or(0),
        plan_operator_count: plan.map(PlanGraph::operator_count).unwrap_or(0),
        rejected_documents: docs.rejected.clone(),
        ranking,
        plan_bottlenecks,
        operator_detail,
    }
}
