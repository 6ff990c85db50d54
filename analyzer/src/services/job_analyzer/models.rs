//! Job telemetry data models
//!
//! Entities built from the plan and runtime documents, plus the read-only
//! views produced by ranking and correlation. Views borrow from the owned
//! graphs; nothing is mutated after construction.

use serde::{Serialize, Serializer};

// ============================================================================
// Runtime Graph
// ============================================================================

/// How vertices were located in the runtime document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VertexDiscovery {
    /// Elements carrying an `id` attribute with the vertex prefix
    IdAttribute,
    /// Elements whose tag name is the vertex id
    TagName,
    /// Neither strategy matched anything
    NotFound,
}

/// Per-vertex execution statistics from the runtime document
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeGraph {
    pub vertices: Vec<RuntimeVertex>,
    pub discovery: VertexDiscovery,
    /// Stat blocks that were absent and defaulted to zero
    pub defaulted_blocks: usize,
}

/// One executed graph node
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeVertex {
    pub id: String,
    pub kind: String,
    pub memory: MemoryStats,
    pub time: TimeStats,
    pub data: DataStats,
    pub exceptions: ExceptionCounts,
    pub page_faults: PageFaultStats,
    pub operators: Vec<RuntimeOperator>,
}

/// Memory peaks in bytes
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub avg_execution_memory_peak_size: u64,
    pub max_execution_memory_peak_size: u64,
    pub avg_io_memory_peak_size: u64,
    pub max_io_memory_peak_size: u64,
    pub avg_overall_memory_peak_size: u64,
    pub max_overall_memory_peak_size: u64,
    pub avg_private_memory_peak_size: u64,
    pub max_private_memory_peak_size: u64,
    pub avg_working_set_peak_size: u64,
    pub max_working_set_peak_size: u64,
}

/// Time counters in the document's native unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeStats {
    pub elapsed_time: u64,
    pub execute_elapsed_time: u64,
    pub inclusive_time: u64,
    pub total_cpu_time: u64,
    pub execute_total_cpu_time: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataStats {
    pub data_read: u64,
    pub compressed_data_read: u64,
    pub data_written: u64,
    pub compressed_data_written: u64,
}

impl DataStats {
    pub fn input_bytes(&self) -> u64 {
        self.data_read
    }

    pub fn output_bytes(&self) -> u64 {
        self.data_written
    }

    pub fn total_bytes(&self) -> u64 {
        self.data_read.saturating_add(self.data_written)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExceptionCounts {
    pub cpp_exceptions: u64,
    pub managed_exceptions: u64,
    pub other_exceptions: u64,
}

impl ExceptionCounts {
    pub fn total(&self) -> u64 {
        self.cpp_exceptions
            .saturating_add(self.managed_exceptions)
            .saturating_add(self.other_exceptions)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageFaultStats {
    pub avg_page_fault_count: u64,
    pub max_page_fault_count: u64,
}

/// Operator counters from the runtime document
///
/// `id` is the correlation token: it matches a plan operator's `uid`.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeOperator {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_time: Option<u64>,
}

// ============================================================================
// Plan Graph
// ============================================================================

/// Compiled execution graph from the plan document
#[derive(Debug, Clone, Serialize)]
pub struct PlanGraph {
    pub vertices: Vec<PlanVertex>,
    /// Memory estimate blocks that were absent and defaulted to zero
    pub defaulted_blocks: usize,
}

impl PlanGraph {
    pub fn operator_count(&self) -> usize {
        self.vertices.iter().map(|v| v.operators.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanVertex {
    pub id: String,
    pub limit_memory_estimate: MemoryEstimate,
    pub optimal_memory_estimate: MemoryEstimate,
    pub operators: Vec<PlanOperator>,
}

/// Memory estimate in bytes, all-zero when the estimate node is absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryEstimate {
    pub process_memory: u64,
    pub managed_memory: u64,
    pub engine_memory: u64,
    pub engine_io_memory: u64,
    pub engine_operator_memory: u64,
    pub min_engine_operator_memory: u64,
    pub adapter_memory: u64,
}

/// Operator definition from the plan document
///
/// `id` is vertex-local and not comparable across documents; `uid` is the
/// global key used for correlation.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOperator {
    pub id: String,
    pub uid: String,
    pub class_name: String,
    pub assembly_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    pub inputs: Vec<PlanOperatorIo>,
    pub outputs: Vec<PlanOperatorIo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanOperatorIo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub schema: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub is_nullable: bool,
}

// ============================================================================
// Ranking Results
// ============================================================================

/// Job-wide totals over all runtime vertices
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobTotals {
    pub vertex_count: usize,
    pub total_elapsed_time: u64,
    pub total_cpu_time: u64,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
}

impl JobTotals {
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    pub fn avg_elapsed_time(&self) -> Option<f64> {
        (self.vertex_count > 0).then(|| self.total_elapsed_time as f64 / self.vertex_count as f64)
    }

    pub fn avg_input_bytes(&self) -> Option<f64> {
        (self.vertex_count > 0).then(|| self.total_input_bytes as f64 / self.vertex_count as f64)
    }

    /// Input bytes per time unit across the job
    pub fn avg_read_rate(&self) -> Option<f64> {
        (self.total_elapsed_time > 0)
            .then(|| self.total_input_bytes as f64 / self.total_elapsed_time as f64)
    }
}

/// One entry of a top-N view
#[derive(Debug, Clone, Serialize)]
pub struct RankedVertex<'a> {
    pub rank: usize,
    #[serde(rename = "vertex_id", serialize_with = "serialize_runtime_vertex_id")]
    pub vertex: &'a RuntimeVertex,
    /// The value the view is sorted by
    pub metric: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkewDirection {
    Expansion,
    Reduction,
}

impl SkewDirection {
    pub fn label(&self) -> &'static str {
        match self {
            SkewDirection::Expansion => "expansion",
            SkewDirection::Reduction => "reduction",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkewEntry<'a> {
    pub rank: usize,
    #[serde(rename = "vertex_id", serialize_with = "serialize_runtime_vertex_id")]
    pub vertex: &'a RuntimeVertex,
    /// written / read
    pub ratio: f64,
    /// |ratio - 1|
    pub score: f64,
    pub direction: SkewDirection,
}

/// Why a vertex looks busy without moving data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum AnomalyReason {
    SlowWithLittleInput {
        elapsed_time: u64,
        avg_elapsed_time: f64,
        input_bytes: u64,
        avg_input_bytes: f64,
    },
    LowReadRate {
        read_rate: f64,
        avg_read_rate: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly<'a> {
    #[serde(rename = "vertex_id", serialize_with = "serialize_runtime_vertex_id")]
    pub vertex: &'a RuntimeVertex,
    pub reasons: Vec<AnomalyReason>,
}

/// All runtime-side views; empty when there are no vertices
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeRanking<'a> {
    pub totals: JobTotals,
    pub by_memory: Vec<RankedVertex<'a>>,
    pub by_elapsed_time: Vec<RankedVertex<'a>>,
    pub by_data_volume: Vec<RankedVertex<'a>>,
    pub by_skew: Vec<SkewEntry<'a>>,
    pub anomalies: Vec<Anomaly<'a>>,
}

// ============================================================================
// Plan Scoring and Correlation Results
// ============================================================================

/// Plan vertex with its importance score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPlanVertex<'a> {
    pub rank: usize,
    #[serde(rename = "vertex_id", serialize_with = "serialize_plan_vertex_id")]
    pub vertex: &'a PlanVertex,
    /// limit / optimal engine operator memory, 0 when optimal is 0
    pub memory_ratio: f64,
    pub complex_operators: usize,
    pub score: f64,
}

/// A runtime operator resolved to its plan definition
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedOperator<'a> {
    pub vertex_id: &'a str,
    pub uid: &'a str,
    pub operator_id: &'a str,
    pub class_name: &'a str,
    pub assembly_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    pub input_fields: Vec<&'a str>,
    pub output_fields: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_time: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Correlation<'a> {
    pub records: Vec<CorrelatedOperator<'a>>,
    /// Identifiers asked for
    pub requested: usize,
    /// Identifiers with no plan operator of that uid
    pub unresolved: usize,
}

/// Final detail section: correlated operators, or plan-only fallback
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", content = "detail")]
pub enum OperatorDetail<'a> {
    Correlated(Correlation<'a>),
    PlanOnly(Vec<ScoredPlanVertex<'a>>),
}

/// Outcome of loading one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message")]
pub enum DocumentStatus {
    Loaded,
    NotProvided,
    Failed(String),
}

/// A document of undetected kind that could not be read, parsed or classified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedDocument {
    pub path: String,
    pub reason: String,
}

/// Complete analysis of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobAnalysis<'a> {
    pub runtime_status: DocumentStatus,
    pub plan_status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_discovery: Option<VertexDiscovery>,
    pub plan_vertex_count: usize,
    pub plan_operator_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_documents: Vec<RejectedDocument>,
    pub ranking: RuntimeRanking<'a>,
    pub plan_bottlenecks: Vec<ScoredPlanVertex<'a>>,
    pub operator_detail: OperatorDetail<'a>,
}

fn serialize_runtime_vertex_id<S: Serializer>(
    vertex: &&RuntimeVertex,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&vertex.id)
}

fn serialize_plan_vertex_id<S: Serializer>(
    vertex: &&PlanVertex,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&vertex.id)
}
