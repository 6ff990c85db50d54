//! Runtime vertex ranking
//!
//! Job totals plus one top-N view per dimension. Views hold references into
//! the runtime graph and never reorder or copy it.

use super::anomaly::AnomalyDetector;
use super::top_k::top_k;
use crate::config::AnalysisConfig;
use crate::services::job_analyzer::models::*;

/// Ranker for runtime vertices
pub struct VertexRanker;

impl VertexRanker {
    /// Compute totals, all top-N views and the anomaly scan
    pub fn rank<'a>(vertices: &'a [RuntimeVertex], config: &AnalysisConfig) -> RuntimeRanking<'a> {
        let totals = Self::totals(vertices);
        if totals.is_empty() {
            tracing::info!("No runtime vertices to rank");
            return RuntimeRanking { totals, ..Default::default() };
        }

        let n = config.top_n;
        RuntimeRanking {
            by_memory: Self::top_by(vertices, n, |v| v.memory.avg_overall_memory_peak_size),
            by_elapsed_time: Self::top_by(vertices, n, |v| v.time.elapsed_time),
            by_data_volume: Self::top_by(vertices, n, |v| v.data.total_bytes()),
            by_skew: Self::top_by_skew(vertices, n, config.skew_expansion_ratio),
            anomalies: AnomalyDetector::scan(vertices, &totals, config),
            totals,
        }
    }

    /// Sums over all vertices
    pub fn totals(vertices: &[RuntimeVertex]) -> JobTotals {
        vertices.iter().fold(
            JobTotals { vertex_count: vertices.len(), ..Default::default() },
            |mut acc, v| {
                acc.total_elapsed_time = acc.total_elapsed_time.saturating_add(v.time.elapsed_time);
                acc.total_cpu_time = acc.total_cpu_time.saturating_add(v.time.total_cpu_time);
                acc.total_input_bytes = acc.total_input_bytes.saturating_add(v.data.input_bytes());
                acc.total_output_bytes =
                    acc.total_output_bytes.saturating_add(v.data.output_bytes());
                acc
            },
        )
    }

    fn top_by<'a, F>(vertices: &'a [RuntimeVertex], n: usize, metric: F) -> Vec<RankedVertex<'a>>
    where
        F: Fn(&RuntimeVertex) -> u64,
    {
        top_k(vertices.iter().map(|v| (v, metric(v))), n)
            .into_iter()
            .enumerate()
            .map(|(i, (vertex, metric))| RankedVertex { rank: i + 1, vertex, metric })
            .collect()
    }

    /// Vertices whose written/read ratio deviates most from 1:1
    ///
    /// Only vertices that both read and wrote data take part.
    fn top_by_skew(
        vertices: &[RuntimeVertex],
        n: usize,
        expansion_ratio: f64,
    ) -> Vec<SkewEntry<'_>> {
        let candidates = vertices.iter().filter_map(|v| {
            let ratio = Self::skew_ratio(v)?;
            Some((v, (ratio - 1.0).abs()))
        });

        top_k(candidates, n)
            .into_iter()
            .enumerate()
            .map(|(i, (vertex, score))| {
                let ratio = Self::skew_ratio(vertex).unwrap_or(1.0);
                SkewEntry {
                    rank: i + 1,
                    vertex,
                    ratio,
                    score,
                    direction: Self::classify_skew(ratio, expansion_ratio),
                }
            })
            .collect()
    }

    /// written / read, None unless both are non-zero
    pub fn skew_ratio(vertex: &RuntimeVertex) -> Option<f64> {
        let read = vertex.data.data_read;
        let written = vertex.data.data_written;
        (read > 0 && written > 0).then(|| written as f64 / read as f64)
    }

    pub fn classify_skew(ratio: f64, expansion_ratio: f64) -> SkewDirection {
        if ratio > expansion_ratio {
            SkewDirection::Expansion
        } else {
            SkewDirection::Reduction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_analyzer::tests::fixtures::vertex;

    fn ids<'a>(view: &[RankedVertex<'a>]) -> Vec<&'a str> {
        view.iter().map(|r| r.vertex.id.as_str()).collect()
    }

    #[test]
    fn test_empty_input_yields_empty_views() {
        let ranking = VertexRanker::rank(&[], &AnalysisConfig::default());
        assert_eq!(ranking.totals, JobTotals::default());
        assert!(ranking.by_memory.is_empty());
        assert!(ranking.by_elapsed_time.is_empty());
        assert!(ranking.by_data_volume.is_empty());
        assert!(ranking.by_skew.is_empty());
        assert!(ranking.anomalies.is_empty());
        assert_eq!(ranking.totals.avg_elapsed_time(), None);
        assert_eq!(ranking.totals.avg_read_rate(), None);
    }

    #[test]
    fn test_totals() {
        let vertices = vec![vertex("SV1_A", 10, 100, 1000, 500), vertex("SV2_B", 20, 200, 3000, 0)];
        let totals = VertexRanker::totals(&vertices);
        assert_eq!(totals.vertex_count, 2);
        assert_eq!(totals.total_elapsed_time, 30);
        assert_eq!(totals.total_input_bytes, 4000);
        assert_eq!(totals.total_output_bytes, 500);
        assert_eq!(totals.avg_elapsed_time(), Some(15.0));
    }

    #[test]
    fn test_memory_ranking_is_stable_and_bounded() {
        let vertices: Vec<RuntimeVertex> = (1..=8)
            .map(|i| {
                let mut v = vertex(&format!("SV{}_Op", i), 10, 10, 10, 10);
                v.memory.avg_overall_memory_peak_size = if i % 2 == 0 { 500 } else { 100 };
                v
            })
            .collect();
        let config = AnalysisConfig::default();

        let ranking = VertexRanker::rank(&vertices, &config);
        assert_eq!(ids(&ranking.by_memory), vec!["SV2_Op", "SV4_Op", "SV6_Op", "SV8_Op", "SV1_Op"]);
        assert_eq!(ranking.by_memory[0].rank, 1);
        assert_eq!(ranking.by_memory[4].metric, 100);

        let again = VertexRanker::rank(&vertices, &config);
        assert_eq!(ids(&again.by_memory), ids(&ranking.by_memory));
        assert_eq!(ids(&again.by_elapsed_time), ids(&ranking.by_elapsed_time));
    }

    #[test]
    fn test_data_volume_ranking() {
        let vertices = vec![
            vertex("SV1_A", 1, 1, 100, 100),
            vertex("SV2_B", 1, 1, 50, 500),
            vertex("SV3_C", 1, 1, 300, 0),
        ];
        let ranking = VertexRanker::rank(&vertices, &AnalysisConfig::default());
        assert_eq!(ids(&ranking.by_data_volume), vec!["SV2_B", "SV3_C", "SV1_A"]);
        assert_eq!(ranking.by_data_volume[0].metric, 550);

        let top_input: u64 = ranking.by_data_volume.iter().map(|r| r.vertex.data.input_bytes()).sum();
        assert!(top_input <= ranking.totals.total_input_bytes);
    }

    #[test]
    fn test_skew_classification() {
        let vertices = vec![
            vertex("SV1_Expand", 1, 1, 1000, 2000),
            vertex("SV2_Reduce", 1, 1, 1000, 900),
            vertex("SV3_NoWrite", 1, 1, 1000, 0),
        ];
        let ranking = VertexRanker::rank(&vertices, &AnalysisConfig::default());

        assert_eq!(ranking.by_skew.len(), 2);
        let expand = &ranking.by_skew[0];
        assert_eq!(expand.vertex.id, "SV1_Expand");
        assert_eq!(expand.ratio, 2.0);
        assert_eq!(expand.score, 1.0);
        assert_eq!(expand.direction, SkewDirection::Expansion);

        let reduce = &ranking.by_skew[1];
        assert_eq!(reduce.vertex.id, "SV2_Reduce");
        assert_eq!(reduce.direction, SkewDirection::Reduction);
        assert!((reduce.score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_moderate_growth_is_reduction() {
        assert_eq!(VertexRanker::classify_skew(1.5, 1.5), SkewDirection::Reduction);
        assert_eq!(VertexRanker::classify_skew(1.51, 1.5), SkewDirection::Expansion);
    }
}
