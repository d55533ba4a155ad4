//! Core functionality for the traffic-defense service.
//!
//! This module contains the admission-control pipeline: feature
//! extraction and windowing, statistical and sequence-model anomaly
//! scoring, stateful defense bookkeeping, the decision orchestrator,
//! capacity-aware load distribution, snapshot/rollback and the
//! proof-of-work utility.

pub mod balancer;
pub mod cloud;
pub mod defense;
pub mod detector;
pub mod features;
pub mod proof_of_work;
pub mod recovery;
pub mod sequence;
pub mod statistical;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Detection thresholds.
///
/// Every threshold is runtime configuration; observed operating values
/// vary widely between deployments, so nothing here is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Requests-per-second hard threshold (http_flood)
    pub rps_threshold: f64,
    /// Per-request byte hard threshold (bandwidth_flood)
    pub bandwidth_threshold: f64,
    /// SYN count hard threshold (syn_flood)
    pub syn_threshold: u32,
    /// Z-score threshold for the statistical detector
    pub z_score_threshold: f64,
    /// Probability above which the sequence model signals an attack
    pub attack_threshold: f64,
    /// Upper bound on a single sequence-model invocation
    pub scorer_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rps_threshold: 2000.0,
            bandwidth_threshold: 1_000_000.0,
            syn_threshold: 500,
            z_score_threshold: 3.0,
            attack_threshold: 0.8,
            scorer_timeout_ms: 50,
        }
    }
}

/// Attack categories recorded in stats and defense state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    BlacklistedIp,
    RateLimitExceeded,
    HttpFlood,
    BandwidthFlood,
    SynFlood,
    StatisticalAnomaly,
    AnomalyDetected,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::BlacklistedIp => "blacklisted_ip",
            AttackKind::RateLimitExceeded => "rate_limit_exceeded",
            AttackKind::HttpFlood => "http_flood",
            AttackKind::BandwidthFlood => "bandwidth_flood",
            AttackKind::SynFlood => "syn_flood",
            AttackKind::StatisticalAnomaly => "statistical_anomaly",
            AttackKind::AnomalyDetected => "anomaly_detected",
        }
    }

    /// Severe categories earn the source an immediate blacklist entry.
    pub fn is_severe(&self) -> bool {
        matches!(self, AttackKind::SynFlood | AttackKind::HttpFlood)
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single scorer invocation.
///
/// `Inconclusive` routes the orchestrator to the next cheaper check;
/// scorer preconditions are expressed here rather than as faults.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Attack { kind: AttackKind, confidence: f64 },
    Clean,
    Inconclusive,
}

pub use balancer::{LoadBalancer, TokenBucket};
pub use cloud::{CloudMetrics, CloudMetricsProvider};
pub use defense::DefenseState;
pub use detector::{AttackStats, DdosDetector};
pub use features::{extract_features, RequestDescriptor, SlidingWindow};
pub use proof_of_work::ProofOfWork;
pub use recovery::SnapshotStore;
pub use sequence::{RecurrentScorer, SequenceScorer};
pub use statistical::StatisticalDetector;
