//! Document kinds
//!
//! The two telemetry documents have unrelated shapes. They are modeled as a
//! tagged union so callers holding bytes of unknown kind can still route them.

use crate::services::job_analyzer::models::{PlanGraph, RuntimeGraph};
use crate::services::job_analyzer::parser::core::{XmlDecoder, XmlElement};
use crate::services::job_analyzer::parser::{PlanGraphBuilder, RuntimeGraphBuilder};
use crate::utils::{AnalyzerError, AnalyzerResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    Plan,
    Runtime,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Plan => "plan",
            DocumentKind::Runtime => "runtime",
        }
    }

    /// Classify a decoded document
    ///
    /// Plan documents carry memory estimates, operators with a `uid`, or
    /// `vertex` elements wrapping operators without any runtime counters.
    /// Runtime documents only need prefixed vertices.
    pub fn detect(root: &XmlElement, vertex_prefix: &str) -> Option<DocumentKind> {
        let plan_markers = root.descendants().any(|el| {
            el.is_named("EstimatedLimitMemory")
                || el.is_named("EstimatedOptimalMemory")
                || (el.is_named("operator") && el.attr("uid").is_some())
        });
        let plan_vertices = root.select_named("vertex").into_iter().any(|vertex| {
            vertex.descendants().any(|el| el.is_named("operator")) && !Self::has_runtime_counters(vertex)
        });
        if plan_markers || plan_vertices {
            return Some(DocumentKind::Plan);
        }

        let (vertices, _) = RuntimeGraphBuilder::discover_vertices(root, vertex_prefix);
        (!vertices.is_empty()).then_some(DocumentKind::Runtime)
    }

    fn has_runtime_counters(vertex: &XmlElement) -> bool {
        const STAT_BLOCKS: [&str; 3] = ["Time", "InputStatistics", "OutputStatistics"];
        const OPERATOR_COUNTERS: [&str; 3] = ["rowCount", "inclusiveTime", "exclusiveTime"];

        vertex.descendants().any(|el| {
            STAT_BLOCKS.iter().any(|name| el.is_named(name))
                || (el.is_named("operator") && OPERATOR_COUNTERS.iter().any(|attr| el.attr(attr).is_some()))
        })
    }
}

/// A built document of either kind
#[derive(Debug, Clone)]
pub enum JobDocument {
    Plan(PlanGraph),
    Runtime(RuntimeGraph),
}

impl JobDocument {
    /// Build a document of a known kind
    pub fn parse(kind: DocumentKind, bytes: &[u8], vertex_prefix: &str) -> AnalyzerResult<Self> {
        match kind {
            DocumentKind::Plan => PlanGraphBuilder::from_bytes(bytes).map(JobDocument::Plan),
            DocumentKind::Runtime => {
                RuntimeGraphBuilder::from_bytes(bytes, vertex_prefix).map(JobDocument::Runtime)
            },
        }
    }

    /// Build a document whose kind is sniffed from its content
    pub fn parse_detected(bytes: &[u8], vertex_prefix: &str) -> AnalyzerResult<Self> {
        let root = XmlDecoder::decode(bytes)?;
        match DocumentKind::detect(&root, vertex_prefix) {
            Some(DocumentKind::Plan) => Ok(JobDocument::Plan(PlanGraphBuilder::build(&root))),
            Some(DocumentKind::Runtime) => {
                Ok(JobDocument::Runtime(RuntimeGraphBuilder::build(&root, vertex_prefix)))
            },
            None => Err(AnalyzerError::unrecognized(format!(
                "root element <{}> is neither a plan nor a runtime document",
                root.name
            ))),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            JobDocument::Plan(_) => DocumentKind::Plan,
            JobDocument::Runtime(_) => DocumentKind::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_plan_and_runtime() {
        let plan = br#"<Def><vertex id="SV1_A"><operator id="x" uid="op_1"/></vertex></Def>"#;
        let doc = JobDocument::parse_detected(plan, "SV").unwrap();
        assert_eq!(doc.kind(), DocumentKind::Plan);

        // Runtime operators carry counters, so this is not mistaken for a plan
        let runtime = br#"<Stats><vertex id="SV1_A"><Operator id="op_1" rowCount="10"/></vertex></Stats>"#;
        let doc = JobDocument::parse_detected(runtime, "SV").unwrap();
        assert_eq!(doc.kind(), DocumentKind::Runtime);
    }

    #[test]
    fn test_detect_partial_plan_without_estimates_or_uids() {
        let plan = br#"<Def>
            <vertex id="SV1_Extract">
              <operators>
                <operator id="Extract_0" className="ScopeExtractor">
                  <output schema="a:int"/>
                </operator>
              </operators>
            </vertex>
          </Def>"#;
        let root = XmlDecoder::decode(plan).unwrap();
        assert_eq!(DocumentKind::detect(&root, "SV"), Some(DocumentKind::Plan));

        let JobDocument::Plan(graph) = JobDocument::parse_detected(plan, "SV").unwrap() else {
            panic!("expected a plan document");
        };
        assert_eq!(graph.vertices.len(), 1);
        assert_eq!(graph.operator_count(), 1);
    }

    #[test]
    fn test_detect_runtime_vertex_with_stat_blocks() {
        let runtime = br#"<Stats><vertex id="SV1_A"><Time elapsedTime="5"/><Operator id="op_1"/></vertex></Stats>"#;
        let root = XmlDecoder::decode(runtime).unwrap();
        assert_eq!(DocumentKind::detect(&root, "SV"), Some(DocumentKind::Runtime));
    }

    #[test]
    fn test_detect_unrecognized() {
        let err = JobDocument::parse_detected(b"<Nothing><here/></Nothing>", "SV").unwrap_err();
        assert_eq!(err.error_code(), 1002);
    }

    #[test]
    fn test_parse_known_kind_labels_errors() {
        let err = JobDocument::parse(DocumentKind::Runtime, b"<oops", "SV").unwrap_err();
        assert!(err.to_string().starts_with("Malformed runtime document"));
    }
}
