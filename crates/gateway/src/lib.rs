//! Thin HTTP surface over the trigger scheduler.
//!
//! Exposes the trigger endpoints as plain-text GET routes so any external
//! scheduler (system cron, an uptime monitor, a hosting panel) can drive
//! the cycle. Installs no tracing subscriber; the host application owns
//! observability.

pub mod auth;
pub mod routes;

use std::sync::Arc;

use {jobtick_config::AuthConfig, jobtick_scheduler::service::TriggerService};

pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TriggerService>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<TriggerService>, auth: AuthConfig) -> Self {
        Self {
            service,
            auth: Arc::new(auth),
        }
    }
}
