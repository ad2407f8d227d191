//! Health check and metrics endpoints
//!
//! This module provides the health report for the elo-arena service and the
//! Prometheus text exposition of its metrics.

use crate::metrics::encode_text;
use crate::service::app::AppState;
use crate::utils::current_timestamp;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: i64,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub loaded_collections: usize,
    pub rated_items: usize,
    pub tag_groups: usize,
}

impl HealthCheck {
    /// Check the service and its storage directories
    pub fn check(app_state: &AppState) -> Self {
        let mut checks = vec![
            Self::check_service_running(app_state),
            Self::check_directory("images_dir", &app_state.config().storage.images_dir, true),
            Self::check_directory(
                "snapshot_dir",
                &app_state.config().storage.snapshot_dir,
                false,
            ),
        ];

        let stats = match app_state.manager().get_stats() {
            Ok(stats) => ServiceStats {
                loaded_collections: stats.loaded_collections,
                rated_items: stats.rated_items,
                tag_groups: stats.tag_groups,
            },
            Err(e) => {
                error!("Collection stats unavailable: {}", e);
                checks.push(ComponentCheck {
                    name: "collections".to_string(),
                    status: HealthStatus::Degraded,
                    message: Some(e.to_string()),
                });
                ServiceStats::default()
            }
        };

        let status = checks
            .iter()
            .map(|check| &check.status)
            .fold(HealthStatus::Healthy, |overall, status| {
                match (overall, status) {
                    (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => {
                        HealthStatus::Unhealthy
                    }
                    (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => {
                        HealthStatus::Degraded
                    }
                    _ => HealthStatus::Healthy,
                }
            });

        let timestamp = current_timestamp();
        HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp,
            uptime_seconds: (timestamp - app_state.started_at()).num_seconds(),
            checks,
            stats,
        }
    }

    fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let (status, message) = if app_state.is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is shutting down".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
        }
    }

    /// A missing required directory is unhealthy, a missing optional one degraded
    fn check_directory(name: &str, dir: &Path, required: bool) -> ComponentCheck {
        let (status, message) = if dir.is_dir() {
            (HealthStatus::Healthy, None)
        } else if required {
            (
                HealthStatus::Unhealthy,
                Some(format!("{} is not a directory", dir.display())),
            )
        } else {
            (
                HealthStatus::Degraded,
                Some(format!("{} will be created on first write", dir.display())),
            )
        };

        ComponentCheck {
            name: name.to_string(),
            status,
            message,
        }
    }
}

/// Create the router for `/health` and `/metrics`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    let health = HealthCheck::check(&state);
    let code = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(health))
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Metrics endpoint requested");

    match encode_text(&state.metrics()) {
        Ok((content_type, body)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}
