//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the collection
//! registry to its collaborators and builds the HTTP router serving it.

use crate::collection::{
    CollectionManager, DirectoryItemSource, ItemSource, MetadataResolver,
    PngTextMetadataResolver, ResourceRemover,
};
use crate::config::{validate_config, AppConfig};
use crate::metrics::MetricsCollector;
use crate::rating::{JsonFileSnapshotStore, RatingEngine, SnapshotStore};
use crate::service::{api, health};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Shutdown error: {message}")]
    Shutdown { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Registry of loaded collections
    manager: Arc<CollectionManager>,

    /// Metrics collector shared with the manager
    metrics_collector: Arc<MetricsCollector>,

    started_at: DateTime<Utc>,

    /// Service status
    is_running: AtomicBool,
}

impl AppState {
    /// Initialize the application with directory-backed collaborators
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!(
            "Initializing {} with images from {} and snapshots in {}",
            config.service.name,
            config.storage.images_dir.display(),
            config.storage.snapshot_dir.display()
        );

        if !config.storage.images_dir.is_dir() {
            warn!(
                "Images directory {} does not exist yet; every collection will be reported missing",
                config.storage.images_dir.display()
            );
        }

        let directory = Arc::new(DirectoryItemSource::new(config.storage.images_dir.clone()));
        let snapshots = Arc::new(JsonFileSnapshotStore::new(
            config.storage.snapshot_dir.clone(),
        ));

        Self::with_collaborators(
            config,
            directory.clone(),
            directory,
            Arc::new(PngTextMetadataResolver::new()),
            snapshots,
        )
    }

    /// Initialize the application over caller-supplied collaborators
    pub fn with_collaborators(
        config: AppConfig,
        source: Arc<dyn ItemSource>,
        remover: Arc<dyn ResourceRemover>,
        resolver: Arc<dyn MetadataResolver>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let engine =
            RatingEngine::new(config.rating.clone()).map_err(|e| ServiceError::Configuration {
                message: e.to_string(),
            })?;

        let manager = Arc::new(CollectionManager::new(
            source,
            remover,
            resolver,
            snapshots,
            engine,
            metrics_collector.clone(),
        ));

        Ok(Self {
            config,
            manager,
            metrics_collector,
            started_at: Utc::now(),
            is_running: AtomicBool::new(true),
        })
    }

    /// Build the full HTTP router: API, health, item files and optional frontend
    pub fn router(self: &Arc<Self>) -> Router {
        let mut router = Router::new()
            .merge(api::router(self.clone()))
            .merge(health::router(self.clone()))
            .nest_service("/images", ServeDir::new(&self.config.storage.images_dir));

        if let Some(frontend_dir) = &self.config.storage.frontend_dir {
            info!("Serving frontend from {}", frontend_dir.display());
            router = router.fallback_service(ServeDir::new(frontend_dir));
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Stop accepting work and flush every loaded collection
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);
        self.is_running.store(false, Ordering::SeqCst);

        let manager = self.manager.clone();
        let written = tokio::task::spawn_blocking(move || manager.persist_all())
            .await
            .map_err(|e| ServiceError::Shutdown {
                message: format!("Flush task failed: {}", e),
            })?
            .map_err(|e| ServiceError::Shutdown {
                message: format!("Failed to flush collections: {:#}", e),
            })?;

        info!("Flushed {} collection(s) to disk", written);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the collection registry
    pub fn manager(&self) -> Arc<CollectionManager> {
        self.manager.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Check if service is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
