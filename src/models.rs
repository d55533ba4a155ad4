use serde::{Deserialize, Serialize};

use crate::core::DetectionConfig;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Defense bookkeeping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseConfig {
    /// Blacklist entry time-to-live in seconds
    pub blacklist_duration_secs: u64,
    /// Rate-limit / connection-log window in seconds
    pub rate_limit_window_secs: u64,
    /// In-window request count above which a source is rate limited
    pub max_requests_per_window: usize,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            blacklist_duration_secs: 300,
            rate_limit_window_secs: 60,
            max_requests_per_window: 1000,
        }
    }
}

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Upstream server pool
    pub servers: Vec<String>,
    /// Per-server token bucket capacity
    pub bucket_capacity: f64,
    /// Per-server token refill rate (tokens per second)
    pub fill_rate: f64,
    /// A server loaded past this multiple of the pool average is skipped
    pub load_skew_factor: f64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                "server1.example.com".to_string(),
                "server2.example.com".to_string(),
                "server3.example.com".to_string(),
                "server4.example.com".to_string(),
            ],
            bucket_capacity: 1000.0,
            fill_rate: 100.0,
            load_skew_factor: 1.2,
        }
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Maximum retained snapshots before FIFO eviction
    pub max_snapshots: usize,
    /// Optional directory for one-file-per-snapshot persistence
    pub snapshot_dir: Option<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 5,
            snapshot_dir: None,
        }
    }
}

/// Proof-of-work configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowConfig {
    /// Required number of leading zero hex characters
    pub difficulty: usize,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self { difficulty: 4 }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Detection thresholds
    pub detection: DetectionConfig,
    /// Defense bookkeeping configuration
    pub defense: DefenseConfig,
    /// Load balancer configuration
    pub balancer: BalancerConfig,
    /// Snapshot store configuration
    pub snapshots: SnapshotConfig,
    /// Proof-of-work configuration
    pub proof_of_work: PowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            detection: DetectionConfig::default(),
            defense: DefenseConfig::default(),
            balancer: BalancerConfig::default(),
            snapshots: SnapshotConfig::default(),
            proof_of_work: PowConfig::default(),
        }
    }
}
