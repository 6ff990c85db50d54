//! Markdown report rendering
//!
//! Section order is fixed. Every section is always present; a section with
//! nothing to show says so instead of being omitted.

use crate::config::TimeUnit;
use crate::services::job_analyzer::models::*;
use crate::utils::AnalyzerResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

const NO_DATA: &str = "_No data available for this dimension._";

/// Renders a [`JobAnalysis`] as Markdown
pub struct ReportFormatter {
    time_unit: TimeUnit,
}

impl ReportFormatter {
    /// `time_unit` is the unit of the runtime document's time counters
    pub fn new(time_unit: TimeUnit) -> Self {
        Self { time_unit }
    }

    pub fn render(&self, analysis: &JobAnalysis<'_>) -> String {
        let mut out = String::from("# Job Execution Analysis\n\n");
        self.render_summary(&mut out, analysis);
        self.render_memory(&mut out, &analysis.ranking.by_memory);
        self.render_time(&mut out, &analysis.ranking.by_elapsed_time, &analysis.ranking.totals);
        self.render_data(&mut out, &analysis.ranking.by_data_volume);
        self.render_skew(&mut out, &analysis.ranking.by_skew);
        self.render_anomalies(&mut out, &analysis.ranking.anomalies);
        match &analysis.operator_detail {
            OperatorDetail::Correlated(correlation) => {
                self.render_correlation(&mut out, correlation);
                out.push_str("### Plan Bottleneck Candidates\n\n");
                Self::render_plan_table(&mut out, &analysis.plan_bottlenecks);
            },
            OperatorDetail::PlanOnly(scored) => {
                out.push_str("## Plan Bottleneck Vertices\n\n");
                out.push_str("_No runtime operators to correlate; plan vertices ranked by importance._\n\n");
                Self::render_plan_table(&mut out, scored);
            },
        }
        out
    }

    fn duration(&self, value: u64) -> String {
        format_duration_ms(self.time_unit.to_millis(value))
    }

    fn render_summary(&self, out: &mut String, analysis: &JobAnalysis<'_>) {
        let totals = &analysis.ranking.totals;
        out.push_str("## Overall Summary\n\n");
        out.push_str(&format!("- Runtime document: {}\n", status_text(&analysis.runtime_status)));
        out.push_str(&format!("- Plan document: {}\n", status_text(&analysis.plan_status)));
        for rejected in &analysis.rejected_documents {
            out.push_str(&format!("- Rejected document {}: {}\n", rejected.path, rejected.reason));
        }
        if let Some(discovery) = analysis.runtime_discovery {
            let how = match discovery {
                VertexDiscovery::IdAttribute => "by id attribute",
                VertexDiscovery::TagName => "by element name",
                VertexDiscovery::NotFound => "none found",
            };
            out.push_str(&format!("- Vertex discovery: {}\n", how));
        }
        out.push_str(&format!("- Runtime vertices: {}\n", totals.vertex_count));
        if totals.is_empty() {
            out.push('\n');
            out.push_str(NO_DATA);
            out.push_str("\n\n");
        } else {
            out.push_str(&format!("- Total elapsed time: {}\n", self.duration(totals.total_elapsed_time)));
            out.push_str(&format!("- Total CPU time: {}\n", self.duration(totals.total_cpu_time)));
            out.push_str(&format!("- Total input: {}\n", format_bytes(totals.total_input_bytes)));
            out.push_str(&format!("- Total output: {}\n", format_bytes(totals.total_output_bytes)));
            if let Some(avg) = totals.avg_elapsed_time() {
                out.push_str(&format!(
                    "- Average elapsed per vertex: {}\n",
                    format_duration_ms(self.time_unit.to_millis(1) * avg)
                ));
            }
        }
        if analysis.plan_status == DocumentStatus::Loaded {
            out.push_str(&format!(
                "- Plan vertices: {} ({} operators)\n",
                analysis.plan_vertex_count, analysis.plan_operator_count
            ));
        }
        out.push('\n');
    }

    fn render_memory(&self, out: &mut String, view: &[RankedVertex<'_>]) {
        out.push_str("## Top Memory-Intensive Vertices\n\n");
        if view.is_empty() {
            return no_data(out);
        }
        out.push_str("| Rank | Vertex | Kind | Avg Overall Peak | Max Overall Peak | Avg Working Set |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for r in view {
            let m = &r.vertex.memory;
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                r.rank,
                cell(&r.vertex.id),
                cell(&r.vertex.kind),
                format_bytes(m.avg_overall_memory_peak_size),
                format_bytes(m.max_overall_memory_peak_size),
                format_bytes(m.avg_working_set_peak_size),
            ));
        }
        out.push('\n');
    }

    fn render_time(&self, out: &mut String, view: &[RankedVertex<'_>], totals: &JobTotals) {
        out.push_str("## Top Time-Consuming Vertices\n\n");
        if view.is_empty() {
            return no_data(out);
        }
        out.push_str("| Rank | Vertex | Kind | Elapsed | CPU Time | Share of Job |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for r in view {
            let t = &r.vertex.time;
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                r.rank,
                cell(&r.vertex.id),
                cell(&r.vertex.kind),
                self.duration(t.elapsed_time),
                self.duration(t.total_cpu_time),
                percentage(t.elapsed_time, totals.total_elapsed_time),
            ));
        }
        out.push('\n');
    }

    fn render_data(&self, out: &mut String, view: &[RankedVertex<'_>]) {
        out.push_str("## Top Data-Intensive Vertices\n\n");
        if view.is_empty() {
            return no_data(out);
        }
        out.push_str("| Rank | Vertex | Input | Output | Total |\n");
        out.push_str("|---|---|---|---|---|\n");
        for r in view {
            let d = &r.vertex.data;
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                r.rank,
                cell(&r.vertex.id),
                format_bytes(d.input_bytes()),
                format_bytes(d.output_bytes()),
                format_bytes(d.total_bytes()),
            ));
        }
        out.push('\n');
    }

    fn render_skew(&self, out: &mut String, view: &[SkewEntry<'_>]) {
        out.push_str("## Data Skew\n\n");
        if view.is_empty() {
            return no_data(out);
        }
        out.push_str("| Rank | Vertex | Read | Written | Ratio | Direction |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for s in view {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {} |\n",
                s.rank,
                cell(&s.vertex.id),
                format_bytes(s.vertex.data.data_read),
                format_bytes(s.vertex.data.data_written),
                s.ratio,
                s.direction.label(),
            ));
        }
        out.push('\n');
    }

    fn render_anomalies(&self, out: &mut String, anomalies: &[Anomaly<'_>]) {
        out.push_str("## Anomalies\n\n");
        if anomalies.is_empty() {
            return no_data(out);
        }
        for anomaly in anomalies {
            out.push_str(&format!("- **{}**\n", anomaly.vertex.id));
            for reason in &anomaly.reasons {
                let text = match reason {
                    AnomalyReason::SlowWithLittleInput { elapsed_time, avg_elapsed_time, input_bytes, avg_input_bytes } => {
                        format!(
                            "elapsed {} vs. job average {}, input {} vs. average {}",
                            self.duration(*elapsed_time),
                            format_duration_ms(self.time_unit.to_millis(1) * avg_elapsed_time),
                            format_bytes(*input_bytes),
                            format_bytes(avg_input_bytes.round() as u64),
                        )
                    },
                    AnomalyReason::LowReadRate { read_rate, avg_read_rate } => {
                        let per_ms = |rate: f64| {
                            let unit_ms = self.time_unit.to_millis(1);
                            format_bytes((rate / unit_ms).round() as u64)
                        };
                        format!(
                            "read rate {}/ms vs. job average {}/ms",
                            per_ms(*read_rate),
                            per_ms(*avg_read_rate)
                        )
                    },
                };
                out.push_str(&format!("  - {}\n", text));
            }
        }
        out.push('\n');
    }

    fn render_correlation(&self, out: &mut String, correlation: &Correlation<'_>) {
        out.push_str("## Correlated Operators\n\n");
        if correlation.records.is_empty() {
            out.push_str(NO_DATA);
            out.push_str("\n\n");
        } else {
            out.push_str("| Vertex | Operator | UID | Class | Source | Inputs | Outputs | Rows |\n");
            out.push_str("|---|---|---|---|---|---|---|---|\n");
            for r in &correlation.records {
                let source = match (r.source_file, r.source_line) {
                    (Some(file), Some(line)) => format!("{}:{}", file, line),
                    (Some(file), None) => file.to_string(),
                    _ => "-".to_string(),
                };
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
                    cell(r.vertex_id),
                    cell(r.operator_id),
                    cell(r.uid),
                    cell(r.class_name),
                    cell(&source),
                    cell(&field_list(&r.input_fields)),
                    cell(&field_list(&r.output_fields)),
                    r.row_count.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                ));
            }
            out.push('\n');
        }
        if correlation.unresolved > 0 {
            out.push_str(&format!("_{} operators had no source mapping._\n\n", correlation.unresolved));
        }
    }

    fn render_plan_table(out: &mut String, scored: &[ScoredPlanVertex<'_>]) {
        if scored.is_empty() {
            return no_data(out);
        }
        out.push_str("| Rank | Vertex | Memory Ratio | Complex Operators | Operators | Score |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for s in scored {
            out.push_str(&format!(
                "| {} | {} | {:.2} | {} | {} | {:.2} |\n",
                s.rank,
                cell(&s.vertex.id),
                s.memory_ratio,
                s.complex_operators,
                s.vertex.operators.len(),
                s.score,
            ));
        }
        out.push('\n');
    }
}

/// Machine-readable report: the analysis plus where it came from
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_path: Option<String>,
    pub analysis: &'a JobAnalysis<'a>,
}

impl<'a> JsonReport<'a> {
    pub fn new(analysis: &'a JobAnalysis<'a>, plan_path: Option<&Path>, runtime_path: Option<&Path>) -> Self {
        Self {
            analyzed_at: Utc::now(),
            plan_path: plan_path.map(|p| p.display().to_string()),
            runtime_path: runtime_path.map(|p| p.display().to_string()),
            analysis,
        }
    }

    pub fn render(&self) -> AnalyzerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn no_data(out: &mut String) {
    out.push_str(NO_DATA);
    out.push_str("\n\n");
}

fn status_text(status: &DocumentStatus) -> String {
    match status {
        DocumentStatus::Loaded => "loaded".to_string(),
        DocumentStatus::NotProvided => "not provided".to_string(),
        DocumentStatus::Failed(message) => format!("failed ({})", message),
    }
}

fn field_list(fields: &[&str]) -> String {
    if fields.is_empty() { "-".to_string() } else { fields.join(", ") }
}

/// Table cells cannot hold pipes or line breaks
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn percentage(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

/// Format bytes to human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in ms to human-readable string
pub fn format_duration_ms(ms: f64) -> String {
    if !ms.is_finite() || ms <= 0.0 {
        "0ms".to_string()
    } else if ms < 1.0 {
        format!("{:.2}us", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.2}ms", ms)
    } else if ms < 60000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        let minutes = (ms / 60000.0).floor();
        let seconds = (ms % 60000.0) / 1000.0;
        format!("{:.0}m{:.2}s", minutes, seconds)
    }
}
