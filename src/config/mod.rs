//! Configuration management for the traffic-defense service.
//!
//! This module handles loading and managing application configuration
//! from environment variables and configuration files.

use std::env;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};

use crate::models::Config;

/// Load configuration from a config file and environment variables
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::default())
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("detection.rps_threshold", 2000.0)?
        .set_default("detection.bandwidth_threshold", 1_000_000.0)?
        .set_default("detection.syn_threshold", 500)?
        .set_default("detection.z_score_threshold", 3.0)?
        .set_default("detection.attack_threshold", 0.8)?
        .set_default("detection.scorer_timeout_ms", 50)?
        .set_default("defense.blacklist_duration_secs", 300)?
        .set_default("defense.rate_limit_window_secs", 60)?
        .set_default("defense.max_requests_per_window", 1000)?
        .set_default(
            "balancer.servers",
            vec![
                "server1.example.com",
                "server2.example.com",
                "server3.example.com",
                "server4.example.com",
            ],
        )?
        .set_default("balancer.bucket_capacity", 1000.0)?
        .set_default("balancer.fill_rate", 100.0)?
        .set_default("balancer.load_skew_factor", 1.2)?
        .set_default("snapshots.max_snapshots", 5)?
        .set_default("proof_of_work.difficulty", 4)?
        .build()?;

    config.try_deserialize()
}
