//! Decision orchestrator for the admission-control pipeline.
//!
//! Sequences the defense checks for every inbound descriptor:
//! blacklist, rate limit, hard thresholds, then statistical or
//! sequence-model anomaly scoring. Any positive verdict mutates defense
//! state, bumps the attack counters and emits a structured attack
//! record. Failures anywhere fail open to the cheapest check; the
//! request path never propagates an error and never blocks all traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, warn};
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::defense::DefenseState;
use crate::core::features::{
    extract_features, FeatureVector, RequestDescriptor, SlidingWindow, WINDOW_CAPACITY,
};
use crate::core::sequence::{ScoreError, SequenceScorer};
use crate::core::statistical::StatisticalDetector;
use crate::core::{AttackKind, DetectionConfig, Verdict};
use crate::models::DefenseConfig;

/// Monotonically accumulating attack counters; reset only on restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackStats {
    pub total_attacks: u64,
    pub last_attack_time: Option<DateTime<Utc>>,
    pub attack_types: HashMap<String, u64>,
}

/// Structured record emitted at warn level for every positive verdict.
#[derive(Debug, Serialize)]
struct AttackRecord<'a> {
    id: Uuid,
    timestamp: DateTime<Utc>,
    source_ip: &'a str,
    confidence: f64,
    request_rate: f64,
    bytes: f64,
    attack_type: &'static str,
}

/// Lock acquisition that survives a poisoned mutex.
///
/// A panic elsewhere must not turn into "always block" here, so a
/// poisoned guard is recovered rather than propagated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The admission-control orchestrator.
pub struct DdosDetector {
    config: DetectionConfig,
    defense: Mutex<DefenseState>,
    window: Mutex<SlidingWindow>,
    stats: Mutex<AttackStats>,
    statistical: StatisticalDetector,
    scorer: Arc<dyn SequenceScorer>,
    scorer_timeout: Duration,
}

impl DdosDetector {
    pub fn new(
        config: DetectionConfig,
        defense_config: &DefenseConfig,
        scorer: Arc<dyn SequenceScorer>,
    ) -> Self {
        let statistical = StatisticalDetector::new(config.z_score_threshold);
        let scorer_timeout = Duration::from_millis(config.scorer_timeout_ms);
        Self {
            config,
            defense: Mutex::new(DefenseState::new(defense_config)),
            window: Mutex::new(SlidingWindow::new(WINDOW_CAPACITY)),
            stats: Mutex::new(AttackStats::default()),
            statistical,
            scorer,
            scorer_timeout,
        }
    }

    /// Classify one request descriptor.
    ///
    /// Returns `true` when the request should be blocked. All side
    /// effects (defense mutation, stat counters, attack log) happen
    /// here.
    pub async fn is_attack(&self, request: &RequestDescriptor) -> bool {
        counter!("traffic_shield_requests_checked_total", 1);
        match self.evaluate(request).await {
            Verdict::Attack { kind, confidence } => {
                self.record_attack(request, kind, confidence);
                true
            }
            Verdict::Clean | Verdict::Inconclusive => false,
        }
    }

    /// Snapshot of the accumulated attack statistics.
    pub fn get_attack_stats(&self) -> AttackStats {
        lock(&self.stats).clone()
    }

    async fn evaluate(&self, request: &RequestDescriptor) -> Verdict {
        let source = request.source_ip.as_str();

        // Stateful checks first; lock held only for these two reads
        // plus the possible rate-limit mutation.
        {
            let mut defense = lock(&self.defense);
            if defense.is_blacklisted(source) {
                return Verdict::Attack {
                    kind: AttackKind::BlacklistedIp,
                    confidence: 1.0,
                };
            }
            if defense.check_rate_limit(source) {
                defense.apply_defense(source, AttackKind::RateLimitExceeded);
                return Verdict::Attack {
                    kind: AttackKind::RateLimitExceeded,
                    confidence: 1.0,
                };
            }
        }

        let features = extract_features(request);
        let matrix = {
            let mut window = lock(&self.window);
            window.push(features);
            window.to_matrix()
        };

        if let Some(kind) = self.hard_threshold_hit(request, &features) {
            self.apply_defense(source, kind);
            return Verdict::Attack {
                kind,
                confidence: 1.0,
            };
        }

        if matrix.len() < WINDOW_CAPACITY {
            return self.statistical_verdict(source, &matrix, features[0]);
        }

        match self.score_sequence(matrix.clone()).await {
            Ok(probability) if probability > self.config.attack_threshold => {
                self.apply_defense(source, AttackKind::AnomalyDetected);
                Verdict::Attack {
                    kind: AttackKind::AnomalyDetected,
                    confidence: probability,
                }
            }
            Ok(_) => Verdict::Clean,
            Err(err) => {
                // Fail open to the cheapest check.
                warn!(
                    "sequence scoring unavailable ({}), falling back to statistical check",
                    err
                );
                self.statistical_verdict(source, &matrix, features[0])
            }
        }
    }

    fn hard_threshold_hit(
        &self,
        request: &RequestDescriptor,
        features: &FeatureVector,
    ) -> Option<AttackKind> {
        if features[0] > self.config.rps_threshold {
            return Some(AttackKind::HttpFlood);
        }
        if features[1] > self.config.bandwidth_threshold {
            return Some(AttackKind::BandwidthFlood);
        }
        if request.syn_count > self.config.syn_threshold {
            return Some(AttackKind::SynFlood);
        }
        None
    }

    fn statistical_verdict(
        &self,
        source: &str,
        matrix: &[FeatureVector],
        current_rps: f64,
    ) -> Verdict {
        let verdict = self.statistical.score(matrix, current_rps);
        if let Verdict::Attack { kind, .. } = verdict {
            self.apply_defense(source, kind);
        }
        verdict
    }

    /// Run the sequence scorer isolated from all shared state.
    ///
    /// The model is CPU-bound and of unknown latency, so it runs on a
    /// blocking thread under a timeout. No lock is held across this
    /// await; a slow or panicking scorer costs this request its model
    /// verdict and nothing else.
    async fn score_sequence(&self, matrix: Vec<FeatureVector>) -> Result<f64, ScoreError> {
        let scorer = Arc::clone(&self.scorer);
        let handle = tokio::task::spawn_blocking(move || scorer.score(&matrix));
        match tokio::time::timeout(self.scorer_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ScoreError::Task(join_err.to_string())),
            Err(_) => Err(ScoreError::Timeout),
        }
    }

    fn apply_defense(&self, source: &str, kind: AttackKind) {
        lock(&self.defense).apply_defense(source, kind);
    }

    fn record_attack(&self, request: &RequestDescriptor, kind: AttackKind, confidence: f64) {
        {
            let mut stats = lock(&self.stats);
            stats.total_attacks += 1;
            stats.last_attack_time = Some(Utc::now());
            *stats.attack_types.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }
        counter!("traffic_shield_attacks_total", 1, "attack_type" => kind.as_str());

        let record = AttackRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: &request.source_ip,
            confidence,
            request_rate: request.requests_per_second,
            bytes: request.bytes_transferred,
            attack_type: kind.as_str(),
        };
        match serde_json::to_string(&record) {
            Ok(json) => warn!("attack detected: {}", json),
            Err(err) => error!("failed to serialize attack record: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::MockSequenceScorer;

    fn detector_with(scorer: Arc<dyn SequenceScorer>) -> DdosDetector {
        DdosDetector::new(
            DetectionConfig {
                rps_threshold: 1000.0,
                bandwidth_threshold: 1_000_000.0,
                syn_threshold: 100,
                z_score_threshold: 3.0,
                attack_threshold: 0.8,
                scorer_timeout_ms: 200,
            },
            &DefenseConfig::default(),
            scorer,
        )
    }

    fn benign_scorer() -> Arc<dyn SequenceScorer> {
        let mut mock = MockSequenceScorer::new();
        mock.expect_score().returning(|_| Ok(0.0));
        Arc::new(mock)
    }

    fn descriptor(source: &str, rps: f64) -> RequestDescriptor {
        RequestDescriptor {
            source_ip: source.to_string(),
            requests_per_second: rps,
            bytes_transferred: 500.0,
            connection_duration: 1.0,
            syn_count: 0,
        }
    }

    #[tokio::test]
    async fn http_flood_threshold_blocks_and_counts() {
        let detector = detector_with(benign_scorer());
        let request = descriptor("10.0.0.1", 2000.0);
        assert!(detector.is_attack(&request).await);

        let stats = detector.get_attack_stats();
        assert_eq!(stats.total_attacks, 1);
        assert_eq!(stats.attack_types.get("http_flood"), Some(&1));
        assert!(stats.last_attack_time.is_some());
    }

    #[tokio::test]
    async fn http_flood_blacklists_source_for_next_request() {
        let detector = detector_with(benign_scorer());
        assert!(detector.is_attack(&descriptor("10.0.0.2", 2000.0)).await);
        // Second request from the same source is blocked by the
        // blacklist before any scoring runs.
        assert!(detector.is_attack(&descriptor("10.0.0.2", 1.0)).await);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("blacklisted_ip"), Some(&1));
    }

    #[tokio::test]
    async fn bandwidth_flood_detected() {
        let detector = detector_with(benign_scorer());
        let mut request = descriptor("10.0.0.3", 10.0);
        request.bytes_transferred = 2_000_000.0;
        assert!(detector.is_attack(&request).await);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("bandwidth_flood"), Some(&1));
    }

    #[tokio::test]
    async fn syn_flood_detected() {
        let detector = detector_with(benign_scorer());
        let mut request = descriptor("10.0.0.4", 10.0);
        request.syn_count = 500;
        assert!(detector.is_attack(&request).await);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("syn_flood"), Some(&1));
    }

    #[tokio::test]
    async fn statistical_detector_flags_spike_in_short_window() {
        let detector = detector_with(benign_scorer());
        for _ in 0..10 {
            assert!(!detector.is_attack(&descriptor("10.0.1.1", 10.0)).await);
        }
        // Eleventh sample spikes well past three standard deviations.
        assert!(detector.is_attack(&descriptor("10.0.1.1", 500.0)).await);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("statistical_anomaly"), Some(&1));
    }

    #[tokio::test]
    async fn benign_traffic_is_admitted() {
        let detector = detector_with(benign_scorer());
        for i in 0..150 {
            let request = descriptor("10.0.2.1", 10.0 + (i % 3) as f64);
            assert!(!detector.is_attack(&request).await, "request {} blocked", i);
        }
    }

    #[tokio::test]
    async fn sequence_verdict_above_threshold_blocks() {
        let mut mock = MockSequenceScorer::new();
        mock.expect_score().returning(|_| Ok(0.95));
        let detector = detector_with(Arc::new(mock));

        let mut blocked = false;
        for _ in 0..WINDOW_CAPACITY {
            blocked = detector.is_attack(&descriptor("10.0.3.1", 10.0)).await;
        }
        // Model only runs once the window is full; the final request of
        // the warm-up is the first it can flag.
        assert!(blocked);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("anomaly_detected"), Some(&1));
    }

    #[tokio::test]
    async fn scorer_failure_falls_back_to_statistical() {
        let mut mock = MockSequenceScorer::new();
        mock.expect_score()
            .returning(|_| Err(ScoreError::Task("model runtime unavailable".into())));
        let detector = detector_with(Arc::new(mock));

        for _ in 0..WINDOW_CAPACITY {
            assert!(!detector.is_attack(&descriptor("10.0.4.1", 10.0)).await);
        }
        // Statistical fallback still catches the spike.
        assert!(detector.is_attack(&descriptor("10.0.4.1", 900.0)).await);
        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("statistical_anomaly"), Some(&1));
    }

    #[tokio::test]
    async fn slow_scorer_times_out_and_falls_back_to_statistical() {
        // Scorer would confidently flag everything, but it sleeps far
        // past the configured budget; the verdict must come from the
        // statistical detector instead.
        let mut mock = MockSequenceScorer::new();
        mock.expect_score().returning(|_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(0.99)
        });
        let detector = DdosDetector::new(
            DetectionConfig {
                rps_threshold: 5000.0,
                bandwidth_threshold: 1_000_000.0,
                syn_threshold: 1000,
                z_score_threshold: 3.0,
                attack_threshold: 0.8,
                scorer_timeout_ms: 20,
            },
            &DefenseConfig::default(),
            Arc::new(mock),
        );

        for _ in 0..WINDOW_CAPACITY {
            assert!(!detector.is_attack(&descriptor("10.0.5.1", 10.0)).await);
        }
        assert!(detector.is_attack(&descriptor("10.0.5.1", 900.0)).await);

        let stats = detector.get_attack_stats();
        assert_eq!(stats.attack_types.get("statistical_anomaly"), Some(&1));
        assert!(stats.attack_types.get("anomaly_detected").is_none());
    }

    #[tokio::test]
    async fn unknown_source_never_accumulates_defense_state() {
        let detector = detector_with(benign_scorer());
        let mut request = descriptor("unknown", 5000.0);
        request.syn_count = 1000;
        // Blocked by the hard threshold, but no blacklist entry forms.
        assert!(detector.is_attack(&request).await);
        assert!(!detector.is_attack(&descriptor("unknown", 1.0)).await);
    }
}
