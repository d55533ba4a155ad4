//! Z-score based fallback anomaly detector.
//!
//! Usable with as few as 11 samples, this is the cheap check the
//! orchestrator falls back to whenever the sequence model cannot run.

use crate::core::features::FeatureVector;
use crate::core::{AttackKind, Verdict};

/// Window lengths at or below this yield no verdict.
pub const MIN_SAMPLES: usize = 10;

/// Guards the division when the window has zero variance.
const EPSILON: f64 = 1e-10;

/// Statistical detector flagging RPS values far above the recent baseline.
#[derive(Debug, Clone)]
pub struct StatisticalDetector {
    z_threshold: f64,
}

impl StatisticalDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Score the current RPS against the window's RPS column.
    ///
    /// Returns `Inconclusive` until more than [`MIN_SAMPLES`] samples are
    /// available; otherwise an attack verdict when the z-score exceeds
    /// the configured threshold.
    pub fn score(&self, window: &[FeatureVector], current_rps: f64) -> Verdict {
        if window.len() <= MIN_SAMPLES {
            return Verdict::Inconclusive;
        }

        let n = window.len() as f64;
        let mean = window.iter().map(|v| v[0]).sum::<f64>() / n;
        let variance = window.iter().map(|v| (v[0] - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let z_score = (current_rps - mean) / (std_dev + EPSILON);
        if z_score > self.z_threshold {
            Verdict::Attack {
                kind: AttackKind::StatisticalAnomaly,
                confidence: 1.0,
            }
        } else {
            Verdict::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(rps_values: &[f64]) -> Vec<FeatureVector> {
        rps_values.iter().map(|&rps| [rps, 0.0, 0.0]).collect()
    }

    #[test]
    fn inconclusive_below_minimum_samples() {
        let detector = StatisticalDetector::new(3.0);
        let window = window_of(&[10.0; 10]);
        assert_eq!(detector.score(&window, 5000.0), Verdict::Inconclusive);
    }

    #[test]
    fn flags_spike_after_steady_baseline() {
        // Eleventh sample jumps from a flat 10 RPS baseline to 500.
        let detector = StatisticalDetector::new(3.0);
        let mut values = vec![10.0; 10];
        values.push(500.0);
        let window = window_of(&values);
        match detector.score(&window, 500.0) {
            Verdict::Attack { kind, .. } => assert_eq!(kind, AttackKind::StatisticalAnomaly),
            other => panic!("expected attack verdict, got {:?}", other),
        }
    }

    #[test]
    fn clean_for_in_baseline_traffic() {
        let detector = StatisticalDetector::new(3.0);
        let window = window_of(&[10.0, 12.0, 9.0, 11.0, 10.0, 13.0, 8.0, 10.0, 11.0, 12.0, 10.0]);
        assert_eq!(detector.score(&window, 11.0), Verdict::Clean);
    }

    #[test]
    fn zero_variance_window_does_not_divide_by_zero() {
        let detector = StatisticalDetector::new(3.0);
        let window = window_of(&[10.0; 20]);
        // Identical samples: epsilon keeps the z-score finite, and any
        // spike above the flat baseline is flagged.
        match detector.score(&window, 11.0) {
            Verdict::Attack { .. } => {}
            other => panic!("expected attack verdict, got {:?}", other),
        }
        assert_eq!(detector.score(&window, 10.0), Verdict::Clean);
    }
}
