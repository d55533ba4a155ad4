//! Traffic-Defense Service
//!
//! This is the main entry point for the traffic-defense service.
//! It initializes the admission-control components and starts the web
//! server.

use std::sync::{Arc, Mutex};

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use metrics_exporter_prometheus::PrometheusBuilder;

use traffic_shield::api::{self, ApiState};
use traffic_shield::config::load_config;
use traffic_shield::core::{
    CloudMetricsProvider, DdosDetector, LoadBalancer, ProofOfWork, RecurrentScorer,
    SnapshotStore,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting traffic-defense service...");

    // Load configuration
    let config = load_config().context("failed to load configuration")?;
    let config = Arc::new(config);

    // Install the Prometheus metrics recorder
    if let Err(err) = PrometheusBuilder::new().install() {
        warn!("metrics recorder not installed: {}", err);
    }

    // Initialize the admission-control pipeline
    let detector = Arc::new(DdosDetector::new(
        config.detection.clone(),
        &config.defense,
        Arc::new(RecurrentScorer::new()),
    ));
    let balancer = Arc::new(Mutex::new(LoadBalancer::new(
        config.balancer.servers.clone(),
        &config.balancer,
    )));
    let snapshots = Arc::new(Mutex::new(SnapshotStore::new(&config.snapshots)));

    // Create API state
    let state = web::Data::new(ApiState {
        detector,
        balancer,
        snapshots,
        proof_of_work: ProofOfWork::new(config.proof_of_work.difficulty),
        cloud: CloudMetricsProvider::new(),
        config: config.clone(),
    });

    // Start HTTP server
    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::config))
        .bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await?;

    Ok(())
}
