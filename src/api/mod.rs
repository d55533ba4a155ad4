//! API endpoints for the traffic-defense service.
//!
//! Thin HTTP surface over the core: admission checks, attack stats,
//! load distribution, server health, snapshot/rollback and the
//! proof-of-work gate. No detection logic lives here.

use std::sync::{Arc, Mutex};

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::balancer::DistributionStatus;
use crate::core::{
    CloudMetricsProvider, DdosDetector, LoadBalancer, ProofOfWork, RequestDescriptor,
    SnapshotStore,
};
use crate::models::Config;

pub struct ApiState {
    pub detector: Arc<DdosDetector>,
    pub balancer: Arc<Mutex<LoadBalancer>>,
    pub snapshots: Arc<Mutex<SnapshotStore>>,
    pub proof_of_work: ProofOfWork,
    pub cloud: CloudMetricsProvider,
    pub config: Arc<Config>,
}

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/traffic/check").route(web::post().to(check_traffic)))
            .service(web::resource("/stats").route(web::get().to(attack_stats)))
            .service(web::resource("/distribute").route(web::post().to(distribute)))
            .service(
                web::resource("/servers/{id}/health").route(web::put().to(set_server_health)),
            )
            .service(
                web::resource("/snapshots")
                    .route(web::post().to(create_snapshot))
                    .route(web::get().to(list_snapshots)),
            )
            .service(
                web::resource("/snapshots/{id}/rollback").route(web::post().to(rollback)),
            )
            .service(web::resource("/pow/challenge").route(web::get().to(pow_challenge)))
            .service(web::resource("/pow/verify").route(web::post().to(verify_pow)))
            .service(web::resource("/system-metrics").route(web::get().to(system_metrics))),
    );
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Traffic check response
#[derive(Serialize)]
struct TrafficResponse {
    is_attack: bool,
    attack_stats: crate::core::AttackStats,
}

/// Distribution request body
#[derive(Debug, Deserialize)]
struct DistributeRequest {
    #[serde(default = "default_size")]
    size: f64,
}

fn default_size() -> f64 {
    1.0
}

/// Server health update body
#[derive(Debug, Deserialize)]
struct HealthUpdate {
    healthy: bool,
}

/// Proof-of-work verification body
#[derive(Debug, Deserialize)]
struct PowVerifyRequest {
    data: String,
    nonce: String,
}

#[derive(Serialize)]
struct PowVerifyResponse {
    valid: bool,
    difficulty: usize,
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Classify a request descriptor and report the running attack stats
async fn check_traffic(
    state: web::Data<ApiState>,
    descriptor: web::Json<RequestDescriptor>,
) -> impl Responder {
    let is_attack = state.detector.is_attack(&descriptor).await;
    let response = TrafficResponse {
        is_attack,
        attack_stats: state.detector.get_attack_stats(),
    };
    if is_attack {
        HttpResponse::TooManyRequests().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

async fn attack_stats(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.detector.get_attack_stats())
}

/// Select and gate a destination server for one admitted request
async fn distribute(
    state: web::Data<ApiState>,
    body: web::Json<DistributeRequest>,
) -> impl Responder {
    // A negative size would credit the server's token bucket.
    if !body.size.is_finite() || body.size <= 0.0 {
        return HttpResponse::BadRequest().body("size must be a positive number");
    }
    let result = lock(&state.balancer).distribute_request(body.size);
    match result.status {
        DistributionStatus::Accepted => HttpResponse::Ok().json(result),
        DistributionStatus::Rejected => HttpResponse::ServiceUnavailable().json(result),
    }
}

async fn set_server_health(
    state: web::Data<ApiState>,
    path: web::Path<String>,
    body: web::Json<HealthUpdate>,
) -> impl Responder {
    let id = path.into_inner();
    if lock(&state.balancer).update_server_health(&id, body.healthy) {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().body(format!("unknown server: {}", id))
    }
}

async fn create_snapshot(state: web::Data<ApiState>, body: web::Json<Value>) -> impl Responder {
    let snapshot = lock(&state.snapshots).create_snapshot(body.into_inner());
    HttpResponse::Ok().json(snapshot)
}

async fn list_snapshots(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(lock(&state.snapshots).list_snapshots())
}

async fn rollback(state: web::Data<ApiState>, path: web::Path<u64>) -> impl Responder {
    let result = lock(&state.snapshots).rollback_to_snapshot(path.into_inner());
    if result.success {
        HttpResponse::Ok().json(result)
    } else {
        HttpResponse::NotFound().json(result)
    }
}

#[derive(Serialize)]
struct PowChallengeResponse {
    data: String,
    difficulty: usize,
}

/// Hand a client a fresh puzzle to solve before readmission
async fn pow_challenge(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(PowChallengeResponse {
        data: uuid::Uuid::new_v4().to_string(),
        difficulty: state.proof_of_work.difficulty(),
    })
}

async fn verify_pow(state: web::Data<ApiState>, body: web::Json<PowVerifyRequest>) -> impl Responder {
    let valid = state.proof_of_work.verify(&body.data, &body.nonce);
    HttpResponse::Ok().json(PowVerifyResponse {
        valid,
        difficulty: state.proof_of_work.difficulty(),
    })
}

/// Cloud metrics stub plus pool status in one report
async fn system_metrics(state: web::Data<ApiState>) -> impl Responder {
    let cloud_metrics = state.cloud.get_resource_metrics().await;
    let (servers, average_load, active_servers) = {
        let balancer = lock(&state.balancer);
        (
            balancer.servers(),
            balancer.average_load(),
            balancer.healthy_count(),
        )
    };
    HttpResponse::Ok().json(serde_json::json!({
        "cloud_metrics": cloud_metrics,
        "system_status": {
            "servers": servers,
            "average_load": average_load,
            "active_servers": active_servers,
        },
    }))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
