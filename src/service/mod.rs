//! Service layer for the elo-arena service
//!
//! This module contains the application state, the HTTP API and the health
//! and metrics endpoints.

pub mod api;
pub mod app;
pub mod health;

pub use api::ApiError;
pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
