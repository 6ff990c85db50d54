//! Runtime graph builder
//!
//! Walks a decoded runtime-statistics document. Vertices are found either by an
//! `id` attribute carrying the vertex prefix or, failing that, by tag names that
//! are themselves the vertex id. Every stat block is optional.

use crate::services::job_analyzer::models::*;
use crate::services::job_analyzer::parser::core::{ValueParser, XmlDecoder, XmlElement};
use crate::utils::AnalyzerResult;

/// Builder for the runtime graph
pub struct RuntimeGraphBuilder;

impl RuntimeGraphBuilder {
    /// Decode and build in one step
    pub fn from_bytes(bytes: &[u8], vertex_prefix: &str) -> AnalyzerResult<RuntimeGraph> {
        let root = XmlDecoder::decode(bytes).map_err(|e| e.for_document("runtime"))?;
        Ok(Self::build(&root, vertex_prefix))
    }

    /// Build the runtime graph from a decoded document
    pub fn build(root: &XmlElement, vertex_prefix: &str) -> RuntimeGraph {
        let (elements, discovery) = Self::discover_vertices(root, vertex_prefix);
        let mut defaulted_blocks = 0;

        let vertices: Vec<RuntimeVertex> = elements
            .iter()
            .map(|el| {
                let id = match discovery {
                    VertexDiscovery::IdAttribute => el.attr("id").unwrap_or_default().to_string(),
                    _ => el.name.clone(),
                };
                Self::build_vertex(el, id, &mut defaulted_blocks)
            })
            .collect();

        if vertices.is_empty() {
            tracing::warn!("No runtime vertices found with prefix '{}'", vertex_prefix);
        } else if defaulted_blocks > 0 {
            tracing::warn!(
                "Runtime document: {} stat blocks missing across {} vertices, defaulted to zero",
                defaulted_blocks,
                vertices.len()
            );
        }
        tracing::debug!("Built {} runtime vertices via {:?}", vertices.len(), discovery);

        RuntimeGraph { vertices, discovery, defaulted_blocks }
    }

    /// Locate vertex elements: attribute-based first, tag-name-based as fallback
    pub fn discover_vertices<'e>(
        root: &'e XmlElement,
        vertex_prefix: &str,
    ) -> (Vec<&'e XmlElement>, VertexDiscovery) {
        let by_attribute = root.select_by_id_prefix(vertex_prefix);
        if !by_attribute.is_empty() {
            return (by_attribute, VertexDiscovery::IdAttribute);
        }

        let by_name = root.select_by_name_prefix(vertex_prefix);
        if !by_name.is_empty() {
            return (by_name, VertexDiscovery::TagName);
        }

        (Vec::new(), VertexDiscovery::NotFound)
    }

    fn build_vertex(el: &XmlElement, id: String, defaulted: &mut usize) -> RuntimeVertex {
        let job_object = el.child("VertexExecutionJobObject");
        let memory_sources: Vec<&XmlElement> = std::iter::once(el).chain(job_object).collect();
        let memory = |name: &str| {
            ValueParser::u64_or_zero(memory_sources.iter().find_map(|src| src.attr(name)))
        };

        let time = Self::stat_block(el, &id, "Time", defaulted);
        let input = Self::stat_block(el, &id, "InputStatistics", defaulted);
        let output = Self::stat_block(el, &id, "OutputStatistics", defaulted);
        let exceptions = Self::stat_block(el, &id, "ExceptionCounts", defaulted);
        if job_object.is_none() {
            tracing::debug!("Vertex {}: VertexExecutionJobObject missing, defaulting", id);
            *defaulted += 1;
        }

        let read = |block: Option<&XmlElement>, name: &str| {
            ValueParser::u64_or_zero(block.and_then(|b| b.attr(name)))
        };

        RuntimeVertex {
            kind: ValueParser::vertex_kind(&id),
            memory: MemoryStats {
                avg_execution_memory_peak_size: memory("avgExecutionMemoryPeakSize"),
                max_execution_memory_peak_size: memory("maxExecutionMemoryPeakSize"),
                avg_io_memory_peak_size: memory("avgIOMemoryPeakSize"),
                max_io_memory_peak_size: memory("maxIOMemoryPeakSize"),
                avg_overall_memory_peak_size: memory("avgOverallMemoryPeakSize"),
                max_overall_memory_peak_size: memory("maxOverallMemoryPeakSize"),
                avg_private_memory_peak_size: memory("avgPrivateMemoryPeakSize"),
                max_private_memory_peak_size: memory("maxPrivateMemoryPeakSize"),
                avg_working_set_peak_size: memory("avgWorkingSetPeakSize"),
                max_working_set_peak_size: memory("maxWorkingSetPeakSize"),
            },
            time: TimeStats {
                elapsed_time: read(time, "elapsedTime"),
                execute_elapsed_time: read(time, "executeElapsedTime"),
                inclusive_time: read(time, "inclusiveTime"),
                total_cpu_time: read(time, "totalCpuTime"),
                execute_total_cpu_time: read(time, "executeTotalCpuTime"),
            },
            data: DataStats {
                data_read: read(input, "dataRead"),
                compressed_data_read: read(input, "compressedDataRead"),
                data_written: read(output, "dataWritten"),
                compressed_data_written: read(output, "compressedDataWritten"),
            },
            exceptions: ExceptionCounts {
                cpp_exceptions: read(exceptions, "cppExceptionCount"),
                managed_exceptions: read(exceptions, "managedExceptionCount"),
                other_exceptions: read(exceptions, "otherExceptionCount"),
            },
            page_faults: PageFaultStats {
                avg_page_fault_count: read(job_object, "avgPageFaultCount"),
                max_page_fault_count: read(job_object, "maxPageFaultCount"),
            },
            operators: el.children_named("Operator").map(Self::build_operator).collect(),
            id,
        }
    }

    fn stat_block<'e>(
        el: &'e XmlElement,
        vertex_id: &str,
        name: &str,
        defaulted: &mut usize,
    ) -> Option<&'e XmlElement> {
        let block = el.child(name);
        if block.is_none() {
            tracing::debug!("Vertex {}: {} missing, defaulting to zero", vertex_id, name);
            *defaulted += 1;
        }
        block
    }

    fn build_operator(el: &XmlElement) -> RuntimeOperator {
        RuntimeOperator {
            id: el.attr("id").unwrap_or_default().to_string(),
            row_count: el.attr("rowCount").and_then(ValueParser::parse_u64),
            inclusive_time: el.attr("inclusiveTime").and_then(ValueParser::parse_u64),
            exclusive_time: el.attr("exclusiveTime").and_then(ValueParser::parse_u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(xml: &str) -> RuntimeGraph {
        RuntimeGraphBuilder::from_bytes(xml.as_bytes(), "SV").unwrap()
    }

    #[test]
    fn test_tag_name_discovery() {
        let graph = build(
            r#"<JobStatistics>
  <SV1_Extract avgOverallMemoryPeakSize="2048">
    <Time elapsedTime="100" totalCpuTime="80"/>
    <InputStatistics dataRead="1000"/>
    <OutputStatistics dataWritten="500"/>
    <ExceptionCounts cppExceptionCount="1" managedExceptionCount="2" otherExceptionCount="3"/>
    <VertexExecutionJobObject avgPageFaultCount="7" maxPageFaultCount="9"/>
    <Operator id="op_1" rowCount="10" inclusiveTime="5" exclusiveTime="4"/>
    <Operator id="op_2"/>
  </SV1_Extract>
</JobStatistics>"#,
        );

        assert_eq!(graph.discovery, VertexDiscovery::TagName);
        assert_eq!(graph.defaulted_blocks, 0);
        let v = &graph.vertices[0];
        assert_eq!(v.id, "SV1_Extract");
        assert_eq!(v.kind, "Extract");
        assert_eq!(v.memory.avg_overall_memory_peak_size, 2048);
        assert_eq!(v.time.elapsed_time, 100);
        assert_eq!(v.time.total_cpu_time, 80);
        assert_eq!(v.data.input_bytes(), 1000);
        assert_eq!(v.data.output_bytes(), 500);
        assert_eq!(v.exceptions.total(), 6);
        assert_eq!(v.page_faults.max_page_fault_count, 9);
        assert_eq!(v.operators.len(), 2);
        assert_eq!(v.operators[0].row_count, Some(10));
        assert_eq!(v.operators[1].row_count, None);
    }

    #[test]
    fn test_attribute_discovery_wins_over_tag_names() {
        let graph = build(
            r#"<Stats>
  <Vertex id="SV2_Aggregate"><Time elapsedTime="5"/></Vertex>
  <SV9_Ignored/>
</Stats>"#,
        );

        assert_eq!(graph.discovery, VertexDiscovery::IdAttribute);
        assert_eq!(graph.vertices.len(), 1);
        assert_eq!(graph.vertices[0].id, "SV2_Aggregate");
        assert_eq!(graph.vertices[0].kind, "Aggregate");
    }

    #[test]
    fn test_missing_blocks_default_to_zero() {
        let graph = build(r#"<Stats><SV1_Process/></Stats>"#);

        assert_eq!(graph.vertices.len(), 1);
        // Time, InputStatistics, OutputStatistics, ExceptionCounts, VertexExecutionJobObject
        assert_eq!(graph.defaulted_blocks, 5);
        let v = &graph.vertices[0];
        assert_eq!(v.time.elapsed_time, 0);
        assert_eq!(v.data.total_bytes(), 0);
        assert_eq!(v.memory.avg_overall_memory_peak_size, 0);
        assert!(v.operators.is_empty());
    }

    #[test]
    fn test_memory_falls_back_to_job_object() {
        let graph = build(
            r#"<Stats><SV1_Process>
  <VertexExecutionJobObject avgOverallMemoryPeakSize="4096" maxWorkingSetPeakSize="8192"/>
</SV1_Process></Stats>"#,
        );
        let v = &graph.vertices[0];
        assert_eq!(v.memory.avg_overall_memory_peak_size, 4096);
        assert_eq!(v.memory.max_working_set_peak_size, 8192);
    }

    #[test]
    fn test_non_numeric_values_default_to_zero() {
        let graph = build(
            r#"<Stats><SV1_Process avgOverallMemoryPeakSize="lots">
  <Time elapsedTime="-3" totalCpuTime="12.5"/>
</SV1_Process></Stats>"#,
        );
        let v = &graph.vertices[0];
        assert_eq!(v.memory.avg_overall_memory_peak_size, 0);
        assert_eq!(v.time.elapsed_time, 0);
        assert_eq!(v.time.total_cpu_time, 12);
    }

    #[test]
    fn test_no_vertices() {
        let graph = build(r#"<Stats><Summary/></Stats>"#);
        assert_eq!(graph.discovery, VertexDiscovery::NotFound);
        assert!(graph.vertices.is_empty());
    }
}
