//! Capacity-aware load distribution.
//!
//! Admitted traffic is spread across a server pool by a rotating-cursor
//! round robin that skips unhealthy or overloaded servers; each server
//! is additionally gated by a continuously refilled token bucket.

use std::time::Instant;

use log::warn;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::models::BalancerConfig;

/// Continuous-refill rate limiter.
///
/// Refill happens lazily at consume time from the elapsed monotonic
/// delta; there is no background timer. Token count stays clamped to
/// `[0, capacity]`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    fill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, fill_rate: f64) -> Self {
        Self {
            capacity,
            fill_rate,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill from elapsed time, then admit iff `n` tokens are available.
    ///
    /// Non-finite or negative requests are refused outright; a negative
    /// `n` must never credit the bucket.
    pub fn consume(&mut self, n: f64) -> bool {
        if !n.is_finite() || n < 0.0 {
            return false;
        }
        let now = Instant::now();
        // saturating_duration_since guards against clock regression.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.fill_rate).clamp(0.0, self.capacity);
        self.last_refill = now;

        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

/// Health and load bookkeeping for one upstream server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerState {
    pub id: String,
    pub healthy: bool,
    pub assigned_load: u64,
}

#[derive(Debug)]
struct Backend {
    state: ServerState,
    bucket: TokenBucket,
}

/// Why a request was not handed to a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoAvailableServer,
    UnhealthyServer,
    RateLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Accepted,
    Rejected,
}

/// Result of one distribution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub server: Option<String>,
    pub status: DistributionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

/// Health- and load-aware server selection feeding the token buckets.
#[derive(Debug)]
pub struct LoadBalancer {
    backends: Vec<Backend>,
    cursor: usize,
    load_skew_factor: f64,
}

impl LoadBalancer {
    pub fn new(servers: Vec<String>, config: &BalancerConfig) -> Self {
        let backends = servers
            .into_iter()
            .map(|id| Backend {
                state: ServerState {
                    id,
                    healthy: true,
                    assigned_load: 0,
                },
                bucket: TokenBucket::new(config.bucket_capacity, config.fill_rate),
            })
            .collect();
        Self {
            backends,
            cursor: 0,
            load_skew_factor: config.load_skew_factor,
        }
    }

    /// Pick the next server: round robin from the rotating cursor,
    /// skipping unhealthy servers and servers loaded past
    /// `skew_factor x` the pool average. One full fruitless rotation
    /// falls back to the least-loaded healthy server; with no healthy
    /// server at all there is no selection.
    pub fn get_next_server(&mut self) -> Option<String> {
        self.select_backend().map(|i| self.backends[i].state.id.clone())
    }

    fn select_backend(&mut self) -> Option<usize> {
        if self.backends.is_empty() {
            return None;
        }

        let count = self.backends.len();
        let average = self.average_load();
        let max_load = self.load_skew_factor * average;

        for offset in 0..count {
            let idx = (self.cursor + offset) % count;
            let backend = &self.backends[idx];
            if backend.state.healthy && backend.state.assigned_load as f64 <= max_load {
                self.cursor = (idx + 1) % count;
                return Some(idx);
            }
        }

        // Skew fallback: ignore the load rule, never the health rule.
        let fallback = self
            .backends
            .iter()
            .enumerate()
            .filter(|(_, b)| b.state.healthy)
            .min_by_key(|(_, b)| b.state.assigned_load)
            .map(|(i, _)| i);
        if let Some(idx) = fallback {
            self.cursor = (idx + 1) % count;
        }
        fallback
    }

    /// Select and gate a destination for one admitted request.
    pub fn distribute_request(&mut self, size: f64) -> Distribution {
        let Some(idx) = self.select_backend() else {
            warn!("no available server: entire pool unhealthy or empty");
            counter!("traffic_shield_distribution_rejected_total", 1, "reason" => "no_available_server");
            return Distribution {
                server: None,
                status: DistributionStatus::Rejected,
                reason: Some(RejectReason::NoAvailableServer),
            };
        };
        let id = self.backends[idx].state.id.clone();
        self.dispatch_to(&id, size)
    }

    /// Gate one request at a named server.
    ///
    /// Selection and gating are separate steps so a caller may pin a
    /// destination chosen earlier; the server can have gone unhealthy
    /// in between, which is the one path that rejects with
    /// `unhealthy_server`.
    pub fn dispatch_to(&mut self, id: &str, size: f64) -> Distribution {
        let Some(backend) = self.backends.iter_mut().find(|b| b.state.id == id) else {
            counter!("traffic_shield_distribution_rejected_total", 1, "reason" => "no_available_server");
            return Distribution {
                server: None,
                status: DistributionStatus::Rejected,
                reason: Some(RejectReason::NoAvailableServer),
            };
        };

        if !backend.state.healthy {
            counter!("traffic_shield_distribution_rejected_total", 1, "reason" => "unhealthy_server");
            return Distribution {
                server: Some(backend.state.id.clone()),
                status: DistributionStatus::Rejected,
                reason: Some(RejectReason::UnhealthyServer),
            };
        }
        if !backend.bucket.consume(size) {
            counter!("traffic_shield_distribution_rejected_total", 1, "reason" => "rate_limit");
            return Distribution {
                server: Some(backend.state.id.clone()),
                status: DistributionStatus::Rejected,
                reason: Some(RejectReason::RateLimit),
            };
        }

        backend.state.assigned_load += 1;
        Distribution {
            server: Some(backend.state.id.clone()),
            status: DistributionStatus::Accepted,
            reason: None,
        }
    }

    /// Mark a server healthy or unhealthy. Returns false for an unknown id.
    pub fn update_server_health(&mut self, id: &str, healthy: bool) -> bool {
        match self.backends.iter_mut().find(|b| b.state.id == id) {
            Some(backend) => {
                backend.state.healthy = healthy;
                true
            }
            None => false,
        }
    }

    pub fn average_load(&self) -> f64 {
        if self.backends.is_empty() {
            return 0.0;
        }
        let total: u64 = self.backends.iter().map(|b| b.state.assigned_load).sum();
        total as f64 / self.backends.len() as f64
    }

    /// Epoch boundary: zero out the per-server load counters.
    pub fn reset_loads(&mut self) {
        for backend in &mut self.backends {
            backend.state.assigned_load = 0;
        }
    }

    pub fn servers(&self) -> Vec<ServerState> {
        self.backends.iter().map(|b| b.state.clone()).collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.state.healthy).count()
    }
}
