//! Cross-document operator correlation
//!
//! Runtime operators are matched to plan operators on `uid` only. Plan
//! operator ids are vertex-local and never compared across documents.

use super::plan_scorer::PlanScorer;
use crate::services::job_analyzer::models::*;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

type UidIndex<'a> = HashMap<&'a str, (&'a PlanVertex, &'a PlanOperator)>;

pub struct OperatorCorrelator;

impl OperatorCorrelator {
    /// Operators of every vertex surfaced by the ranking, deduplicated by id
    ///
    /// Views are visited in report order, so the result is deterministic.
    pub fn collect_operators<'a>(ranking: &RuntimeRanking<'a>) -> Vec<&'a RuntimeOperator> {
        let vertices = ranking
            .by_memory
            .iter()
            .map(|r| r.vertex)
            .chain(ranking.by_elapsed_time.iter().map(|r| r.vertex))
            .chain(ranking.by_data_volume.iter().map(|r| r.vertex))
            .chain(ranking.by_skew.iter().map(|s| s.vertex))
            .chain(ranking.anomalies.iter().map(|a| a.vertex));

        let mut seen = HashSet::new();
        vertices
            .flat_map(|v| v.operators.iter())
            .filter(|op| !op.id.is_empty() && seen.insert(op.id.as_str()))
            .collect()
    }

    /// Correlate surfaced runtime operators, or fall back to plan-only scoring
    ///
    /// With no operators to look up, the detail section lists the plan's most
    /// important vertices instead.
    pub fn correlate<'a>(
        plan: Option<&'a PlanGraph>,
        operators: &[&'a RuntimeOperator],
        top_n: usize,
    ) -> OperatorDetail<'a> {
        if operators.is_empty() {
            tracing::info!("No runtime operators to correlate, using plan-only view");
            let scored = plan.map(|p| PlanScorer::top_vertices(&p.vertices, top_n)).unwrap_or_default();
            return OperatorDetail::PlanOnly(scored);
        }

        let Some(plan) = plan else {
            tracing::warn!("{} runtime operators requested but no plan graph to resolve them", operators.len());
            return OperatorDetail::Correlated(Correlation {
                records: Vec::new(),
                requested: operators.len(),
                unresolved: operators.len(),
            });
        };

        let requests = operators.iter().map(|op| (op.id.as_str(), Some(*op)));
        OperatorDetail::Correlated(Self::resolve(plan, requests))
    }

    /// Correlate bare identifiers, without runtime counters
    pub fn correlate_identifiers<'a, S: AsRef<str>>(
        plan: &'a PlanGraph,
        identifiers: &[S],
    ) -> Correlation<'a> {
        Self::resolve(plan, identifiers.iter().map(|id| (id.as_ref(), None)))
    }

    fn resolve<'a, 'r, I>(plan: &'a PlanGraph, requests: I) -> Correlation<'a>
    where
        I: Iterator<Item = (&'r str, Option<&'a RuntimeOperator>)>,
    {
        let index = Self::uid_index(plan);
        let mut correlation = Correlation::default();

        for (identifier, runtime) in requests {
            correlation.requested += 1;
            match index.get(identifier) {
                Some(&(vertex, op)) => correlation.records.push(Self::record(vertex, op, runtime)),
                None => {
                    tracing::debug!("Operator {} has no plan operator with that uid", identifier);
                    correlation.unresolved += 1;
                },
            }
        }

        tracing::info!(
            "Correlated {} of {} operators ({} unresolved)",
            correlation.records.len(),
            correlation.requested,
            correlation.unresolved
        );
        correlation
    }

    /// uid lookup table; the first definition of a duplicated uid wins
    fn uid_index(plan: &PlanGraph) -> UidIndex<'_> {
        let mut index = UidIndex::new();
        for vertex in &plan.vertices {
            for op in vertex.operators.iter().filter(|op| !op.uid.is_empty()) {
                match index.entry(op.uid.as_str()) {
                    Entry::Occupied(_) => {
                        tracing::warn!("Duplicate operator uid {} in vertex {}, keeping first", op.uid, vertex.id);
                    },
                    Entry::Vacant(slot) => {
                        slot.insert((vertex, op));
                    },
                }
            }
        }
        index
    }

    fn record<'a>(
        vertex: &'a PlanVertex,
        op: &'a PlanOperator,
        runtime: Option<&'a RuntimeOperator>,
    ) -> CorrelatedOperator<'a> {
        CorrelatedOperator {
            vertex_id: &vertex.id,
            uid: &op.uid,
            operator_id: &op.id,
            class_name: &op.class_name,
            assembly_name: &op.assembly_name,
            source_file: op.source_file.as_deref(),
            source_line: op.source_line,
            input_fields: Self::field_names(&op.inputs),
            output_fields: Self::field_names(&op.outputs),
            row_count: runtime.and_then(|r| r.row_count),
            inclusive_time: runtime.and_then(|r| r.inclusive_time),
            exclusive_time: runtime.and_then(|r| r.exclusive_time),
        }
    }

    /// Field names only; types stay in the plan graph
    fn field_names(ios: &[PlanOperatorIo]) -> Vec<&str> {
        ios.iter().flat_map(|io| io.fields.iter().map(|f| f.name.as_str())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_analyzer::tests::fixtures::{plan_operator, plan_vertex, runtime_operator};

    fn plan() -> PlanGraph {
        let mut join = plan_operator("Join_3", "op_42", "HashJoin", 2);
        join.source_file = Some("script.usql".to_string());
        join.source_line = Some(27);

        PlanGraph {
            vertices: vec![
                plan_vertex("SV1", 0, 0, vec![plan_operator("Extract_0", "op_1", "Extractor", 0)]),
                plan_vertex("SV3", 0, 0, vec![join, plan_operator("Extract_0", "op_43", "Extractor", 0)]),
            ],
            defaulted_blocks: 0,
        }
    }

    #[test]
    fn test_correlates_by_uid() {
        let plan = plan();
        let correlation = OperatorCorrelator::correlate_identifiers(&plan, &["op_42"]);

        assert_eq!(correlation.records.len(), 1);
        let record = &correlation.records[0];
        assert_eq!(record.vertex_id, "SV3");
        assert_eq!(record.operator_id, "Join_3");
        assert_eq!(record.class_name, "HashJoin");
        assert_eq!(record.source_file, Some("script.usql"));
        assert_eq!(record.source_line, Some(27));
        assert_eq!(record.input_fields, vec!["in0", "in1"]);
        assert_eq!(correlation.unresolved, 0);
    }

    #[test]
    fn test_plan_operator_id_is_not_a_key() {
        let plan = plan();
        let correlation = OperatorCorrelator::correlate_identifiers(&plan, &["Extract_0", "op_99"]);
        assert!(correlation.records.is_empty());
        assert_eq!(correlation.requested, 2);
        assert_eq!(correlation.unresolved, 2);
    }

    #[test]
    fn test_duplicate_uid_first_wins() {
        let mut plan = plan();
        plan.vertices[1].operators.push(plan_operator("Dup", "op_1", "Extractor", 0));
        let correlation = OperatorCorrelator::correlate_identifiers(&plan, &["op_1"]);
        assert_eq!(correlation.records[0].vertex_id, "SV1");
    }

    #[test]
    fn test_runtime_counters_are_carried() {
        let plan = plan();
        let op = runtime_operator("op_43", Some(1200));
        let detail = OperatorCorrelator::correlate(Some(&plan), &[&op], 5);

        let OperatorDetail::Correlated(correlation) = detail else {
            panic!("expected correlated detail");
        };
        assert_eq!(correlation.records[0].row_count, Some(1200));
        assert_eq!(correlation.records[0].vertex_id, "SV3");
    }

    #[test]
    fn test_empty_request_falls_back_to_plan_scoring() {
        let plan = plan();
        let detail = OperatorCorrelator::correlate(Some(&plan), &[], 5);

        let OperatorDetail::PlanOnly(scored) = detail else {
            panic!("expected plan-only detail");
        };
        assert_eq!(scored.len(), 2);
        // SV3 holds the join
        assert_eq!(scored[0].vertex.id, "SV3");
    }

    #[test]
    fn test_no_plan_leaves_everything_unresolved() {
        let op = runtime_operator("op_1", None);
        let OperatorDetail::Correlated(correlation) = OperatorCorrelator::correlate(None, &[&op], 5) else {
            panic!("expected correlated detail");
        };
        assert!(correlation.records.is_empty());
        assert_eq!(correlation.unresolved, 1);
    }

    #[test]
    fn test_collect_operators_dedupes() {
        use crate::services::job_analyzer::tests::fixtures::vertex;

        let mut a = vertex("SV1_A", 10, 10, 100, 100);
        a.operators = vec![runtime_operator("op_1", None), runtime_operator("", None)];
        let mut b = vertex("SV2_B", 20, 10, 100, 100);
        b.operators = vec![runtime_operator("op_2", None), runtime_operator("op_1", None)];
        let vertices = vec![a, b];

        let ranking = super::super::VertexRanker::rank(&vertices, &Default::default());
        let ids: Vec<&str> =
            OperatorCorrelator::collect_operators(&ranking).iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"op_1"));
        assert!(ids.contains(&"op_2"));
    }
}
