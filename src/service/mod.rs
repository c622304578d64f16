//! Service layer for the party queue service
//!
//! The exposed operations surface, application state, background tasks and
//! health reporting.

pub mod api;
pub mod app;
pub mod health;

pub use api::GroupApi;
pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus, ServiceStats};
