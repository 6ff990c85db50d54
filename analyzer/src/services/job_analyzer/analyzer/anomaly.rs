//! Anomaly scan
//!
//! Flags vertices that look busy without moving data: slow stages with little
//! input, and stages reading far below the job's average rate.

use crate::config::AnalysisConfig;
use crate::services::job_analyzer::models::*;

pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Scan all vertices in document order
    pub fn scan<'a>(
        vertices: &'a [RuntimeVertex],
        totals: &JobTotals,
        config: &AnalysisConfig,
    ) -> Vec<Anomaly<'a>> {
        let (Some(avg_elapsed), Some(avg_input)) =
            (totals.avg_elapsed_time(), totals.avg_input_bytes())
        else {
            return Vec::new();
        };
        let avg_rate = totals.avg_read_rate();

        let anomalies: Vec<Anomaly<'a>> = vertices
            .iter()
            .filter_map(|vertex| {
                let mut reasons = Vec::new();

                let elapsed = vertex.time.elapsed_time;
                let input = vertex.data.input_bytes();
                if elapsed as f64 > config.anomaly_elapsed_factor * avg_elapsed
                    && (input as f64) < config.anomaly_input_factor * avg_input
                {
                    reasons.push(AnomalyReason::SlowWithLittleInput {
                        elapsed_time: elapsed,
                        avg_elapsed_time: avg_elapsed,
                        input_bytes: input,
                        avg_input_bytes: avg_input,
                    });
                }

                if let Some(avg_rate) = avg_rate
                    && avg_rate > 0.0
                    && elapsed > 0
                {
                    let rate = input as f64 / elapsed as f64;
                    if rate < config.anomaly_read_rate_factor * avg_rate {
                        reasons.push(AnomalyReason::LowReadRate {
                            read_rate: rate,
                            avg_read_rate: avg_rate,
                        });
                    }
                }

                (!reasons.is_empty()).then_some(Anomaly { vertex, reasons })
            })
            .collect();

        if !anomalies.is_empty() {
            tracing::info!("Anomaly scan flagged {} of {} vertices", anomalies.len(), vertices.len());
        }
        anomalies
    }
}
