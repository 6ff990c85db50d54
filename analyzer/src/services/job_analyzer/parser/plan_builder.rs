//! Plan graph builder
//!
//! Walks a decoded vertex-plan document: `vertex` elements holding memory
//! estimates and `operator` elements with `input`/`output` wiring.

use crate::services::job_analyzer::models::*;
use crate::services::job_analyzer::parser::core::{SchemaParser, ValueParser, XmlDecoder, XmlElement};
use crate::utils::AnalyzerResult;

/// Builder for the plan graph
pub struct PlanGraphBuilder;

impl PlanGraphBuilder {
    /// Decode and build in one step
    pub fn from_bytes(bytes: &[u8]) -> AnalyzerResult<PlanGraph> {
        let root = XmlDecoder::decode(bytes).map_err(|e| e.for_document("plan"))?;
        Ok(Self::build(&root))
    }

    /// Build the plan graph from a decoded document
    pub fn build(root: &XmlElement) -> PlanGraph {
        let mut defaulted_blocks = 0;
        let vertices: Vec<PlanVertex> = root
            .select_named("vertex")
            .into_iter()
            .map(|el| Self::build_vertex(el, &mut defaulted_blocks))
            .collect();

        let graph = PlanGraph { vertices, defaulted_blocks };
        if graph.vertices.is_empty() {
            tracing::warn!("No vertex elements found in plan document");
        } else if defaulted_blocks > 0 {
            tracing::warn!(
                "Plan document: {} memory estimates missing across {} vertices, defaulted to zero",
                defaulted_blocks,
                graph.vertices.len()
            );
        }
        tracing::debug!(
            "Built {} plan vertices with {} operators",
            graph.vertices.len(),
            graph.operator_count()
        );
        graph
    }

    fn build_vertex(el: &XmlElement, defaulted: &mut usize) -> PlanVertex {
        let id = el.attr("id").unwrap_or_default().to_string();
        if id.is_empty() {
            tracing::debug!("Plan vertex without id attribute");
        }

        let mut estimate = |name: &str| match el.child(name) {
            Some(block) => Self::build_estimate(block),
            None => {
                tracing::debug!("Plan vertex {}: {} missing, defaulting to zero", id, name);
                *defaulted += 1;
                MemoryEstimate::default()
            },
        };
        let limit_memory_estimate = estimate("EstimatedLimitMemory");
        let optimal_memory_estimate = estimate("EstimatedOptimalMemory");

        let operators = el.select_named("operator").into_iter().map(Self::build_operator).collect();

        PlanVertex { id, limit_memory_estimate, optimal_memory_estimate, operators }
    }

    fn build_estimate(el: &XmlElement) -> MemoryEstimate {
        let read = |name: &str| ValueParser::u64_or_zero(el.attr(name));
        MemoryEstimate {
            process_memory: read("processMemory"),
            managed_memory: read("managedMemory"),
            engine_memory: read("engineMemory"),
            engine_io_memory: read("engineIOMemory"),
            engine_operator_memory: read("engineOperatorMemory"),
            min_engine_operator_memory: read("minEngineOperatorMemory"),
            adapter_memory: read("adapterMemory"),
        }
    }

    fn build_operator(el: &XmlElement) -> PlanOperator {
        let text = |name: &str| el.attr(name).unwrap_or_default().to_string();
        let optional = |name: &str| {
            el.attr(name).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };

        PlanOperator {
            id: text("id"),
            uid: text("uid"),
            class_name: text("className"),
            assembly_name: text("assemblyName"),
            source_file: optional("sourceFile"),
            source_line: el.attr("sourceLine").and_then(ValueParser::parse_line),
            args: optional("args"),
            inputs: el.select_named("input").into_iter().map(Self::build_io).collect(),
            outputs: el.select_named("output").into_iter().map(Self::build_io).collect(),
        }
    }

    fn build_io(el: &XmlElement) -> PlanOperatorIo {
        let schema = el.attr("schema").unwrap_or_default().to_string();
        PlanOperatorIo {
            id: el.attr("id").map(str::to_string),
            fields: SchemaParser::parse(&schema),
            schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ScopeVertexDef>
  <vertex id="SV1_Extract">
    <EstimatedLimitMemory processMemory="100" engineOperatorMemory="2000" adapterMemory="5"/>
    <EstimatedOptimalMemory engineOperatorMemory="1000"/>
    <operator id="Extract_0" uid="op_1" className="ScopeExtractor" assemblyName="Scope.Runtime"
              sourceFile="script.usql" sourceLine="12" args="-delimiter ','">
      <output id="out_0" schema="UserId:long,Query:string?"/>
    </operator>
    <operators>
      <operator id="Sort_1" uid="op_2" className="ScopeSort">
        <input id="out_0" schema="UserId:long,Query:string?"/>
        <output schema="UserId:long"/>
      </operator>
    </operators>
  </vertex>
  <vertex id="SV2_Output"/>
</ScopeVertexDef>"#;

    #[test]
    fn test_build_plan_graph() {
        let graph = PlanGraphBuilder::from_bytes(PLAN.as_bytes()).unwrap();

        assert_eq!(graph.vertices.len(), 2);
        assert_eq!(graph.operator_count(), 2);
        // SV2_Output has neither estimate
        assert_eq!(graph.defaulted_blocks, 2);

        let v = &graph.vertices[0];
        assert_eq!(v.id, "SV1_Extract");
        assert_eq!(v.limit_memory_estimate.engine_operator_memory, 2000);
        assert_eq!(v.limit_memory_estimate.process_memory, 100);
        assert_eq!(v.optimal_memory_estimate.engine_operator_memory, 1000);

        let extract = &v.operators[0];
        assert_eq!(extract.uid, "op_1");
        assert_eq!(extract.class_name, "ScopeExtractor");
        assert_eq!(extract.source_file.as_deref(), Some("script.usql"));
        assert_eq!(extract.source_line, Some(12));
        assert_eq!(extract.args.as_deref(), Some("-delimiter ','"));
        assert!(extract.inputs.is_empty());
        assert_eq!(extract.outputs[0].fields.len(), 2);
        assert!(extract.outputs[0].fields[1].is_nullable);

        let sort = &v.operators[1];
        assert_eq!(sort.id, "Sort_1");
        assert_eq!(sort.inputs[0].id.as_deref(), Some("out_0"));
        assert_eq!(sort.outputs[0].schema, "UserId:long");
        assert_eq!(sort.source_file, None);
    }

    #[test]
    fn test_missing_estimates_are_zero() {
        let graph = PlanGraphBuilder::from_bytes(PLAN.as_bytes()).unwrap();
        let v = &graph.vertices[1];
        assert_eq!(v.limit_memory_estimate, MemoryEstimate::default());
        assert_eq!(v.optimal_memory_estimate, MemoryEstimate::default());
        assert!(v.operators.is_empty());
    }

    #[test]
    fn test_malformed_plan_is_an_error() {
        let err = PlanGraphBuilder::from_bytes(b"<ScopeVertexDef><vertex>").unwrap_err();
        assert!(err.to_string().starts_with("Malformed plan document"));
    }
}
