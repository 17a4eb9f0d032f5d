//! Heartbeat timeout detection, long-term eviction and store health.

use super::resolution::ResolutionService;
use crate::registry::{
    domain::{Agent, AgentStatus, RegistryEvent, RegistryEventType, SelectionPolicy},
    ports::{RegistryStore, RegistryStoreResult, StatusGuard, TransitionOutcome},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const HEARTBEAT_TIMEOUT_REASON: &str = "heartbeat_timeout";
const STARTUP_CLEANUP_REASON: &str = "stale_on_startup";

/// Thresholds driving the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSettings {
    timeout: Duration,
    eviction: Option<Duration>,
    startup_cleanup: Duration,
}

impl HealthSettings {
    /// Creates settings; a zero eviction threshold disables eviction.
    #[must_use]
    pub const fn new(timeout: Duration, eviction: Duration, startup_cleanup: Duration) -> Self {
        Self {
            timeout,
            eviction: if eviction.is_zero() {
                None
            } else {
                Some(eviction)
            },
            startup_cleanup,
        }
    }

    /// Returns the heartbeat timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the eviction threshold, if eviction is enabled.
    #[must_use]
    pub const fn eviction(&self) -> Option<Duration> {
        self.eviction
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(30),
        )
    }
}

/// Overall registry health as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    /// Store reachable and the last sweep succeeded.
    Healthy,
    /// Store reachable but the last sweep failed.
    Degraded,
    /// Store unreachable.
    Unhealthy,
}

impl ServiceHealth {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Counts of transitions applied by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Agents marked unhealthy.
    pub expired: usize,
    /// Agents removed.
    pub evicted: usize,
    /// Consumers re-resolved after losing a provider.
    pub recomputed: usize,
}

/// Marks silent agents unhealthy and evicts long-dead ones.
pub struct HealthMonitor<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    resolver: ResolutionService<S, C>,
    settings: HealthSettings,
    degraded: Arc<AtomicBool>,
}

impl<S, C> Clone for HealthMonitor<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            resolver: self.resolver.clone(),
            settings: self.settings,
            degraded: Arc::clone(&self.degraded),
        }
    }
}

impl<S, C> HealthMonitor<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    /// Creates a health monitor.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<C>,
        policy: SelectionPolicy,
        settings: HealthSettings,
    ) -> Self {
        let resolver = ResolutionService::new(Arc::clone(&store), Arc::clone(&clock), policy);
        Self {
            store,
            clock,
            resolver,
            settings,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the configured thresholds.
    #[must_use]
    pub const fn settings(&self) -> HealthSettings {
        self.settings
    }

    /// Runs one sweep: expires agents past the heartbeat timeout, then
    /// evicts agents unhealthy for longer than the eviction threshold.
    ///
    /// # Errors
    ///
    /// Returns the store error that aborted the sweep.
    pub async fn sweep(&self) -> RegistryStoreResult<SweepReport> {
        let now = self.clock.utc();
        let mut report = SweepReport::default();

        if let Some(cutoff) = cutoff(now, self.settings.timeout) {
            let stale = self
                .store
                .stale_agents(cutoff, &[AgentStatus::Healthy, AgentStatus::Unknown])
                .await?;
            for agent in stale {
                if let Some(recomputed) = self
                    .expire(&agent, HEARTBEAT_TIMEOUT_REASON, self.settings.timeout)
                    .await?
                {
                    report.expired += 1;
                    report.recomputed += recomputed;
                }
            }
        }

        if let Some(cutoff) = self
            .settings
            .eviction
            .and_then(|threshold| cutoff(now, threshold))
        {
            let dead = self
                .store
                .stale_agents(cutoff, &[AgentStatus::Unhealthy])
                .await?;
            for agent in dead {
                let guard = StatusGuard::observe(&agent);
                match self.store.remove_agent(agent.id(), Some(guard)).await? {
                    TransitionOutcome::Applied { affected_consumers } => {
                        info!(agent_id = %agent.id(), "evicted unhealthy agent");
                        report.evicted += 1;
                        report.recomputed += self.resolver.recompute_all(&affected_consumers).await;
                    }
                    TransitionOutcome::Skipped => {
                        debug!(agent_id = %agent.id(), "eviction skipped after concurrent heartbeat");
                    }
                }
            }
        }

        Ok(report)
    }

    /// Runs a sweep, recording failures in the degraded flag instead of
    /// returning them.
    pub async fn run_sweep(&self) -> Option<SweepReport> {
        match self.sweep().await {
            Ok(report) => {
                self.degraded.store(false, Ordering::Relaxed);
                if report != SweepReport::default() {
                    info!(
                        expired = report.expired,
                        evicted = report.evicted,
                        recomputed = report.recomputed,
                        "health sweep applied transitions"
                    );
                }
                Some(report)
            }
            Err(err) => {
                self.degraded.store(true, Ordering::Relaxed);
                warn!(error = %err, "health sweep failed");
                None
            }
        }
    }

    /// Marks agents not heard from within the startup threshold unhealthy.
    ///
    /// Returns the number of agents marked.
    ///
    /// # Errors
    ///
    /// Returns the store error that aborted the cleanup.
    pub async fn cleanup_stale_on_startup(&self) -> RegistryStoreResult<usize> {
        let threshold = self.settings.startup_cleanup;
        let Some(cutoff) = cutoff(self.clock.utc(), threshold) else {
            return Ok(0);
        };
        let stale = self
            .store
            .stale_agents(cutoff, &[AgentStatus::Healthy, AgentStatus::Unknown])
            .await?;

        let mut marked = 0;
        for agent in stale {
            if self
                .expire(&agent, STARTUP_CLEANUP_REASON, threshold)
                .await?
                .is_some()
            {
                marked += 1;
            }
        }
        if marked > 0 {
            info!(marked, "marked stale agents unhealthy on startup");
        }
        Ok(marked)
    }

    /// Reports overall service health.
    pub async fn service_health(&self) -> ServiceHealth {
        if let Err(err) = self.store.ping().await {
            warn!(error = %err, "registry store unreachable");
            return ServiceHealth::Unhealthy;
        }
        if self.degraded.load(Ordering::Relaxed) {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Healthy
        }
    }

    /// Marks one agent unhealthy under a guard; returns the number of
    /// consumers re-resolved, or `None` when a concurrent heartbeat won.
    async fn expire(
        &self,
        agent: &Agent,
        reason: &str,
        threshold: Duration,
    ) -> RegistryStoreResult<Option<usize>> {
        let guard = StatusGuard::observe(agent);
        let event = agent.agent_type().emits_status_events().then(|| {
            RegistryEvent::new(
                agent.id().clone(),
                RegistryEventType::Expire,
                json!({
                    "reason": reason,
                    "previous_status": agent.status().as_str(),
                    "last_heartbeat": agent.updated_at().to_rfc3339(),
                    "threshold_seconds": threshold.as_secs(),
                }),
                &*self.clock,
            )
        });

        match self.store.mark_unhealthy(agent.id(), Some(guard), event).await? {
            TransitionOutcome::Applied { affected_consumers } => {
                info!(agent_id = %agent.id(), reason, "agent marked unhealthy");
                Ok(Some(self.resolver.recompute_all(&affected_consumers).await))
            }
            TransitionOutcome::Skipped => {
                debug!(agent_id = %agent.id(), "expiry skipped after concurrent heartbeat");
                Ok(None)
            }
        }
    }
}

fn cutoff(now: DateTime<Utc>, threshold: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(threshold)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
}
