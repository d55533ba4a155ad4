//! Cloud-provider metrics stub.
//!
//! Genuine cloud-API integration is out of scope; this keeps the
//! boundary in place so the API layer has a stable shape to report.
//! Zero business logic lives here.

use serde::{Deserialize, Serialize};

/// Resource metrics as a cloud provider would report them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_throughput: f64,
    pub container_health: String,
}

/// Stub provider; a production deployment swaps this for a real client.
#[derive(Debug, Clone, Default)]
pub struct CloudMetricsProvider;

impl CloudMetricsProvider {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_resource_metrics(&self) -> CloudMetrics {
        CloudMetrics {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            network_throughput: 0.0,
            container_health: "healthy".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_reports_healthy_with_zeroed_usage() {
        let metrics = CloudMetricsProvider::new().get_resource_metrics().await;
        assert_eq!(metrics.cpu_usage, 0.0);
        assert_eq!(metrics.container_health, "healthy");
    }
}
