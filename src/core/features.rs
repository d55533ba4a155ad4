//! Feature extraction and the sliding request window.
//!
//! Every inbound request descriptor is reduced to a fixed 3-tuple of
//! numeric features which is appended to a bounded FIFO window. The
//! window backs both the statistical detector and the sequence scorer.

use serde::{Deserialize, Serialize};

/// Number of feature vectors retained for anomaly scoring.
pub const WINDOW_CAPACITY: usize = 100;

/// Ordered (rps, bytes_transferred, connection_duration) tuple.
pub type FeatureVector = [f64; 3];

/// Raw per-request descriptor supplied by the transport layer.
///
/// Missing fields default to zero (or `"unknown"` for the source) so a
/// partial descriptor is never rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default = "unknown_source")]
    pub source_ip: String,
    #[serde(default)]
    pub requests_per_second: f64,
    #[serde(default)]
    pub bytes_transferred: f64,
    #[serde(default)]
    pub connection_duration: f64,
    #[serde(default)]
    pub syn_count: u32,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            source_ip: unknown_source(),
            requests_per_second: 0.0,
            bytes_transferred: 0.0,
            connection_duration: 0.0,
            syn_count: 0,
        }
    }
}

/// Map a descriptor to its feature vector. Pure.
pub fn extract_features(request: &RequestDescriptor) -> FeatureVector {
    [
        request.requests_per_second,
        request.bytes_transferred,
        request.connection_duration,
    ]
}

/// Fixed-capacity ring buffer of feature vectors.
///
/// Explicit head index and length counter; appending at capacity evicts
/// the oldest entry first (strict FIFO, no reallocation after creation).
#[derive(Debug)]
pub struct SlidingWindow {
    buf: Vec<FeatureVector>,
    head: usize,
    len: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            buf: vec![[0.0; 3]; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Append a vector, evicting the oldest entry when full.
    pub fn push(&mut self, vector: FeatureVector) {
        let capacity = self.buf.len();
        if self.len < capacity {
            self.buf[(self.head + self.len) % capacity] = vector;
            self.len += 1;
        } else {
            self.buf[self.head] = vector;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Copy the window out in FIFO order.
    ///
    /// Cheap (at most `WINDOW_CAPACITY` small arrays) and lets scorers
    /// run without holding the window lock.
    pub fn to_matrix(&self) -> Vec<FeatureVector> {
        let capacity = self.buf.len();
        (0..self.len)
            .map(|i| self.buf[(self.head + i) % capacity])
            .collect()
    }
}
