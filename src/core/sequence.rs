//! Sequence-model anomaly scoring.
//!
//! The orchestrator talks to the model through the narrow
//! [`SequenceScorer`] contract so the concrete classifier (and whatever
//! runtime it drags in) stays swappable and mockable. The reference
//! implementation is a small two-layer recurrent network; weights are
//! deterministically seeded because training is out of scope here.

use thiserror::Error;

use crate::core::features::{FeatureVector, WINDOW_CAPACITY};

/// Errors surfaced by sequence scoring.
///
/// All of these route the orchestrator to the statistical fallback;
/// none of them reach the request path.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("window not full: {got} of {WINDOW_CAPACITY} samples")]
    WindowNotFull { got: usize },
    #[error("sequence scoring timed out")]
    Timeout,
    #[error("scorer task failed: {0}")]
    Task(String),
}

/// Scoring contract: a full window in, an attack probability out.
#[cfg_attr(test, mockall::automock)]
pub trait SequenceScorer: Send + Sync {
    /// Score a window of exactly [`WINDOW_CAPACITY`] feature vectors.
    ///
    /// Returns a probability in `[0, 1]`; `WindowNotFull` when the
    /// precondition is violated.
    fn score(&self, window: &[FeatureVector]) -> Result<f64, ScoreError>;
}

const EPSILON: f64 = 1e-10;

/// Standardize each feature column to zero mean / unit variance.
///
/// Fit on the current window only; no scaler state persists between
/// calls.
fn standardize(window: &[FeatureVector]) -> Vec<FeatureVector> {
    let n = window.len() as f64;
    let mut means = [0.0; 3];
    let mut stds = [0.0; 3];
    for column in 0..3 {
        let mean = window.iter().map(|v| v[column]).sum::<f64>() / n;
        let variance = window.iter().map(|v| (v[column] - mean).powi(2)).sum::<f64>() / n;
        means[column] = mean;
        stds[column] = variance.sqrt();
    }
    window
        .iter()
        .map(|v| {
            [
                (v[0] - means[0]) / (stds[0] + EPSILON),
                (v[1] - means[1]) / (stds[1] + EPSILON),
                (v[2] - means[2]) / (stds[2] + EPSILON),
            ]
        })
        .collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Deterministic weight source so the reference model is reproducible.
struct Xorshift64(u64);

impl Xorshift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in [-scale, scale).
    fn next_weight(&mut self, scale: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        (unit * 2.0 - 1.0) * scale
    }
}

/// One tanh recurrent layer: `h_t = tanh(W_in x_t + W_rec h_{t-1} + b)`.
struct RecurrentLayer {
    input: usize,
    hidden: usize,
    w_in: Vec<f64>,
    w_rec: Vec<f64>,
    bias: Vec<f64>,
}

impl RecurrentLayer {
    fn new(input: usize, hidden: usize, rng: &mut Xorshift64) -> Self {
        let scale = 1.0 / (input as f64).sqrt();
        let rec_scale = 1.0 / (hidden as f64).sqrt();
        Self {
            input,
            hidden,
            w_in: (0..hidden * input).map(|_| rng.next_weight(scale)).collect(),
            w_rec: (0..hidden * hidden)
                .map(|_| rng.next_weight(rec_scale))
                .collect(),
            bias: (0..hidden).map(|_| rng.next_weight(scale)).collect(),
        }
    }

    /// Run the full sequence, returning every hidden state in order.
    fn forward(&self, sequence: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut hidden = vec![0.0; self.hidden];
        let mut outputs = Vec::with_capacity(sequence.len());
        for x in sequence {
            debug_assert_eq!(x.len(), self.input);
            let mut next = vec![0.0; self.hidden];
            for (j, cell) in next.iter_mut().enumerate() {
                let mut acc = self.bias[j];
                for (i, &xi) in x.iter().enumerate() {
                    acc += self.w_in[j * self.input + i] * xi;
                }
                for (i, &hi) in hidden.iter().enumerate() {
                    acc += self.w_rec[j * self.hidden + i] * hi;
                }
                *cell = acc.tanh();
            }
            hidden = next;
            outputs.push(hidden.clone());
        }
        outputs
    }
}

/// Reference sequence classifier: two recurrent layers (64 then 32
/// units) followed by a single sigmoid output unit.
pub struct RecurrentScorer {
    layer1: RecurrentLayer,
    layer2: RecurrentLayer,
    w_out: Vec<f64>,
    b_out: f64,
}

const HIDDEN_1: usize = 64;
const HIDDEN_2: usize = 32;
const WEIGHT_SEED: u64 = 0x51ce_95d1_1a2b_3c4d;

impl RecurrentScorer {
    pub fn new() -> Self {
        let mut rng = Xorshift64(WEIGHT_SEED);
        let layer1 = RecurrentLayer::new(3, HIDDEN_1, &mut rng);
        let layer2 = RecurrentLayer::new(HIDDEN_1, HIDDEN_2, &mut rng);
        let out_scale = 1.0 / (HIDDEN_2 as f64).sqrt();
        let w_out = (0..HIDDEN_2).map(|_| rng.next_weight(out_scale)).collect();
        let b_out = rng.next_weight(out_scale);
        Self {
            layer1,
            layer2,
            w_out,
            b_out,
        }
    }
}

impl Default for RecurrentScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceScorer for RecurrentScorer {
    fn score(&self, window: &[FeatureVector]) -> Result<f64, ScoreError> {
        if window.len() != WINDOW_CAPACITY {
            return Err(ScoreError::WindowNotFull { got: window.len() });
        }

        let scaled = standardize(window);
        let sequence: Vec<Vec<f64>> = scaled.iter().map(|v| v.to_vec()).collect();

        let seq1 = self.layer1.forward(&sequence);
        let seq2 = self.layer2.forward(&seq1);
        // Classification head reads only the final hidden state.
        let last = seq2.last().ok_or(ScoreError::WindowNotFull { got: 0 })?;

        let logit = last
            .iter()
            .zip(&self.w_out)
            .map(|(h, w)| h * w)
            .sum::<f64>()
            + self.b_out;
        Ok(sigmoid(logit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_window(rps: f64) -> Vec<FeatureVector> {
        (0..WINDOW_CAPACITY)
            .map(|i| [rps + (i % 7) as f64, 500.0 + i as f64, 1.0])
            .collect()
    }

    #[test]
    fn rejects_partial_window() {
        let scorer = RecurrentScorer::new();
        let window = full_window(10.0);
        let result = scorer.score(&window[..50]);
        assert!(matches!(result, Err(ScoreError::WindowNotFull { got: 50 })));
    }

    #[test]
    fn probability_is_bounded() {
        let scorer = RecurrentScorer::new();
        let p = scorer.score(&full_window(10.0)).unwrap();
        assert!((0.0..=1.0).contains(&p), "probability out of range: {}", p);
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = RecurrentScorer::new();
        let b = RecurrentScorer::new();
        let window = full_window(25.0);
        assert_eq!(a.score(&window).unwrap(), b.score(&window).unwrap());
    }

    #[test]
    fn standardize_centers_columns() {
        let window: Vec<FeatureVector> =
            (0..4).map(|i| [i as f64, 10.0 * i as f64, 5.0]).collect();
        let scaled = standardize(&window);
        for column in 0..3 {
            let mean: f64 = scaled.iter().map(|v| v[column]).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-9);
        }
    }
}
