//! Shared handler state.

use super::{ApiError, ErrorResponse};
use crate::registry::{
    domain::SelectionPolicy,
    ports::RegistryStore,
    services::{HealthMonitor, HealthSettings, RegistryService},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;

/// Services and clock shared by every request.
pub struct AppState<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    registry: RegistryService<S, C>,
    health: HealthMonitor<S, C>,
    clock: Arc<C>,
    started_at: DateTime<Utc>,
}

impl<S, C> AppState<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    /// Builds the state over one store and clock.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<C>,
        policy: SelectionPolicy,
        settings: HealthSettings,
    ) -> Self {
        let registry = RegistryService::new(Arc::clone(&store), Arc::clone(&clock), policy);
        let health = HealthMonitor::new(store, Arc::clone(&clock), policy, settings);
        let started_at = clock.utc();
        Self {
            registry,
            health,
            clock,
            started_at,
        }
    }

    /// Returns the registry service.
    #[must_use]
    pub const fn registry(&self) -> &RegistryService<S, C> {
        &self.registry
    }

    /// Returns the health monitor.
    ///
    /// The binary clones it to drive the periodic sweep, so `/health`
    /// observes sweep failures.
    #[must_use]
    pub const fn health(&self) -> &HealthMonitor<S, C> {
        &self.health
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Stamps `err` with the current time for rendering.
    #[must_use]
    pub fn reject(&self, err: impl Into<ApiError>) -> ErrorResponse {
        ErrorResponse::new(err.into(), self.now())
    }

    /// Returns whole seconds since the state was built.
    #[must_use]
    pub fn uptime_seconds(&self) -> i64 {
        (self.now() - self.started_at).num_seconds().max(0)
    }
}
