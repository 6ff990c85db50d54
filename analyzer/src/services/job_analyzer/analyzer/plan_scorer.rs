//! Plan-side vertex importance
//!
//! `score = 0.7 * memory_ratio + 0.3 * complex_operators`, where the ratio is
//! limit over optimal engine operator memory.

use super::top_k::top_k;
use crate::services::job_analyzer::models::*;

const MEMORY_WEIGHT: f64 = 0.7;
const COMPLEXITY_WEIGHT: f64 = 0.3;

/// Generated class names carrying these are treated as heavy operators
const COMPLEX_CLASS_MARKERS: &[&str] = &["Sort", "Aggregate", "Join"];

pub struct PlanScorer;

impl PlanScorer {
    /// Highest-scoring plan vertices, ties in document order
    pub fn top_vertices(vertices: &[PlanVertex], k: usize) -> Vec<ScoredPlanVertex<'_>> {
        let scored = vertices.iter().map(|v| {
            let score = Self::score(v);
            (v, score)
        });

        top_k(scored, k)
            .into_iter()
            .enumerate()
            .map(|(i, (vertex, score))| ScoredPlanVertex {
                rank: i + 1,
                vertex,
                memory_ratio: Self::memory_ratio(vertex),
                complex_operators: Self::complex_operator_count(vertex),
                score,
            })
            .collect()
    }

    pub fn score(vertex: &PlanVertex) -> f64 {
        MEMORY_WEIGHT * Self::memory_ratio(vertex)
            + COMPLEXITY_WEIGHT * Self::complex_operator_count(vertex) as f64
    }

    /// 0 when the optimal estimate is zero or absent
    pub fn memory_ratio(vertex: &PlanVertex) -> f64 {
        let optimal = vertex.optimal_memory_estimate.engine_operator_memory;
        if optimal == 0 {
            return 0.0;
        }
        vertex.limit_memory_estimate.engine_operator_memory as f64 / optimal as f64
    }

    pub fn complex_operator_count(vertex: &PlanVertex) -> usize {
        vertex.operators.iter().filter(|op| Self::is_complex(op)).count()
    }

    pub fn is_complex(op: &PlanOperator) -> bool {
        op.inputs.len() > 1
            || COMPLEX_CLASS_MARKERS.iter().any(|marker| op.class_name.contains(marker))
    }
}
