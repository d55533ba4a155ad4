//! Stateful defense bookkeeping.
//!
//! Single owner of the blacklist, rate-limit timestamps and per-source
//! connection logs. Entries expire lazily: every mutation ends with an
//! eager cleanup pass, which stays cheap because all three structures
//! are bounded by short TTL windows.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::info;

use crate::core::AttackKind;
use crate::models::DefenseConfig;

/// Blacklist, rate-limit and connection-tracking state with TTL expiry.
///
/// Callers never see the raw maps; all reads and writes go through the
/// atomic operations below, serialized by the lock the orchestrator
/// wraps this in.
#[derive(Debug)]
pub struct DefenseState {
    blacklist: HashMap<String, Instant>,
    rate_limits: HashMap<String, Instant>,
    connection_log: HashMap<String, VecDeque<Instant>>,
    blacklist_duration: Duration,
    rate_limit_window: Duration,
    max_requests_per_window: usize,
}

impl DefenseState {
    pub fn new(config: &DefenseConfig) -> Self {
        Self {
            blacklist: HashMap::new(),
            rate_limits: HashMap::new(),
            connection_log: HashMap::new(),
            blacklist_duration: Duration::from_secs(config.blacklist_duration_secs),
            rate_limit_window: Duration::from_secs(config.rate_limit_window_secs),
            max_requests_per_window: config.max_requests_per_window,
        }
    }

    /// True iff the source is present and its entry has not aged out.
    pub fn is_blacklisted(&self, source: &str) -> bool {
        match self.blacklist.get(source) {
            Some(&since) => since.elapsed() < self.blacklist_duration,
            None => false,
        }
    }

    /// True when the source's in-window request count exceeds the limit.
    pub fn check_rate_limit(&mut self, source: &str) -> bool {
        if source == "unknown" {
            return false;
        }
        let window = self.rate_limit_window;
        let recent = match self.connection_log.get_mut(source) {
            Some(log) => {
                while log.front().is_some_and(|t| t.elapsed() >= window) {
                    log.pop_front();
                }
                log.len()
            }
            None => 0,
        };
        recent > self.max_requests_per_window
    }

    /// Record a positive verdict against a source.
    ///
    /// Severe categories blacklist the source immediately; every call
    /// stamps the rate-limit map, appends to the connection log and
    /// runs cleanup. Unknown/empty sources are ignored.
    pub fn apply_defense(&mut self, source: &str, kind: AttackKind) {
        if source.is_empty() || source == "unknown" {
            return;
        }

        let now = Instant::now();
        if kind.is_severe() {
            self.blacklist.insert(source.to_string(), now);
            info!("source {} blacklisted for {}", source, kind);
        }
        self.rate_limits.insert(source.to_string(), now);
        self.connection_log
            .entry(source.to_string())
            .or_default()
            .push_back(now);
        self.cleanup();
    }

    /// Drop every entry past its TTL across all three structures.
    pub fn cleanup(&mut self) {
        let blacklist_ttl = self.blacklist_duration;
        self.blacklist.retain(|_, since| since.elapsed() < blacklist_ttl);

        let window = self.rate_limit_window;
        self.rate_limits.retain(|_, stamped| stamped.elapsed() < window);

        self.connection_log.retain(|_, log| {
            while log.front().is_some_and(|t| t.elapsed() >= window) {
                log.pop_front();
            }
            !log.is_empty()
        });
    }

    /// Number of currently blacklisted sources.
    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn config(blacklist_secs: u64, window_secs: u64, max_requests: usize) -> DefenseConfig {
        DefenseConfig {
            blacklist_duration_secs: blacklist_secs,
            rate_limit_window_secs: window_secs,
            max_requests_per_window: max_requests,
        }
    }

    #[test]
    fn severe_attack_blacklists_source() {
        let mut defense = DefenseState::new(&config(300, 60, 1000));
        defense.apply_defense("10.0.0.1", AttackKind::SynFlood);
        assert!(defense.is_blacklisted("10.0.0.1"));
        assert!(!defense.is_blacklisted("10.0.0.2"));
    }

    #[test]
    fn non_severe_attack_does_not_blacklist() {
        let mut defense = DefenseState::new(&config(300, 60, 1000));
        defense.apply_defense("10.0.0.1", AttackKind::StatisticalAnomaly);
        assert!(!defense.is_blacklisted("10.0.0.1"));
    }

    #[test]
    fn unknown_source_is_a_no_op() {
        let mut defense = DefenseState::new(&config(300, 60, 1000));
        defense.apply_defense("unknown", AttackKind::SynFlood);
        defense.apply_defense("", AttackKind::HttpFlood);
        assert_eq!(defense.blacklist_len(), 0);
        assert!(!defense.check_rate_limit("unknown"));
    }

    #[test]
    fn blacklist_expires_after_ttl() {
        let mut defense = DefenseState::new(&config(0, 60, 1000));
        defense.apply_defense("10.0.0.1", AttackKind::HttpFlood);
        // Zero-second TTL: the entry is expired as soon as it lands.
        sleep(Duration::from_millis(5));
        assert!(!defense.is_blacklisted("10.0.0.1"));
        defense.cleanup();
        assert_eq!(defense.blacklist_len(), 0);
    }

    #[test]
    fn rate_limit_trips_above_max_requests() {
        let mut defense = DefenseState::new(&config(300, 60, 3));
        for _ in 0..4 {
            defense.apply_defense("10.0.0.1", AttackKind::RateLimitExceeded);
        }
        assert!(defense.check_rate_limit("10.0.0.1"));
        assert!(!defense.check_rate_limit("10.0.0.9"));
    }

    #[test]
    fn connection_log_prunes_out_of_window_entries() {
        let mut defense = DefenseState::new(&config(300, 0, 0));
        defense.apply_defense("10.0.0.1", AttackKind::RateLimitExceeded);
        sleep(Duration::from_millis(5));
        // Window of zero seconds: everything is already stale.
        assert!(!defense.check_rate_limit("10.0.0.1"));
    }
}
