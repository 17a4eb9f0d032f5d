//! Storage port for agents, capabilities, resolutions and events.

use crate::registry::domain::{
    Agent, AgentId, AgentStatus, Capability, CapabilityChangeSet, ProviderCandidate,
    RegistryEvent, ResolutionSet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for registry store operations.
pub type RegistryStoreResult<T> = Result<T, RegistryStoreError>;

/// Everything written by one registration or full heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationCommit {
    /// Agent state to upsert.
    pub agent: Agent,
    /// Capability reconciliation to apply.
    pub capabilities: CapabilityChangeSet,
    /// Resolution rows for the agent as consumer.
    pub resolutions: ResolutionSet,
    /// Events to append.
    pub events: Vec<RegistryEvent>,
}

/// Expected agent state for an optimistic conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGuard {
    /// Heartbeat timestamp observed when the transition was decided.
    pub updated_at: DateTime<Utc>,
    /// Status observed when the transition was decided.
    pub status: AgentStatus,
}

impl StatusGuard {
    /// Captures the guard from an agent snapshot.
    #[must_use]
    pub const fn observe(agent: &Agent) -> Self {
        Self {
            updated_at: agent.updated_at(),
            status: agent.status(),
        }
    }
}

/// Outcome of a guarded status transition or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The change was written; these consumers lost a provider binding.
    Applied {
        /// Consumers whose resolutions were detached.
        affected_consumers: Vec<AgentId>,
    },
    /// The agent was missing, already in the target state, or changed
    /// concurrently.
    Skipped,
}

/// Persistence contract for the registry.
///
/// Every mutating method is atomic: either all of its writes land or none.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Checks that the store is reachable.
    async fn ping(&self) -> RegistryStoreResult<()>;

    /// Finds an agent by identifier.
    async fn find_agent(&self, agent_id: &AgentId) -> RegistryStoreResult<Option<Agent>>;

    /// Lists every agent ordered by identifier.
    async fn list_agents(&self) -> RegistryStoreResult<Vec<Agent>>;

    /// Lists agents in one of `statuses` whose last heartbeat is before
    /// `cutoff`.
    async fn stale_agents(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[AgentStatus],
    ) -> RegistryStoreResult<Vec<Agent>>;

    /// Returns the capabilities of an agent in declaration order.
    async fn capabilities_of(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<Capability>>;

    /// Returns every capability in the mesh with its agent state and load.
    async fn provider_candidates(&self) -> RegistryStoreResult<Vec<ProviderCandidate>>;

    /// Returns the resolution rows owned by a consumer.
    async fn resolutions_of(&self, agent_id: &AgentId) -> RegistryStoreResult<ResolutionSet>;

    /// Writes a registration atomically.
    ///
    /// Dependency rows are upserted by `(consumer, function, position)` and
    /// LLM provider rows by `(consumer, function)`, keeping existing row
    /// identifiers; rows whose key disappeared are deleted. LLM tool rows are
    /// replaced. Resolutions other consumers hold on capabilities the agent
    /// no longer declares are detached, and those consumers are returned.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::Conflict`] when a uniqueness constraint
    /// is violated.
    async fn commit_registration(
        &self,
        commit: &RegistrationCommit,
    ) -> RegistryStoreResult<Vec<AgentId>>;

    /// Replaces a consumer's resolutions and dependency counters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::AgentNotFound`] when the consumer no
    /// longer exists.
    async fn replace_resolutions(
        &self,
        agent_id: &AgentId,
        resolutions: &ResolutionSet,
    ) -> RegistryStoreResult<()>;

    /// Persists an agent's status and heartbeat timestamp and appends
    /// events. Profile and counters are left as stored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::AgentNotFound`] when the agent does not
    /// exist.
    async fn update_agent(
        &self,
        agent: &Agent,
        events: &[RegistryEvent],
    ) -> RegistryStoreResult<()>;

    /// Marks an agent unhealthy and detaches every resolution it provides.
    ///
    /// With a guard, the write only happens if the agent still has the
    /// guarded heartbeat timestamp and status.
    async fn mark_unhealthy(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
        event: Option<RegistryEvent>,
    ) -> RegistryStoreResult<TransitionOutcome>;

    /// Deletes an agent with everything it owns and detaches every
    /// resolution it provides.
    async fn remove_agent(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
    ) -> RegistryStoreResult<TransitionOutcome>;

    /// Lists consumers other than `exclude` holding an unbound dependency or
    /// LLM provider row on one of `capabilities`.
    async fn consumers_awaiting(
        &self,
        capabilities: &[String],
        exclude: &AgentId,
    ) -> RegistryStoreResult<Vec<AgentId>>;

    /// Returns whether an agent other than `exclude` produced a topology
    /// event after `since`.
    async fn has_topology_events_since(
        &self,
        since: DateTime<Utc>,
        exclude: &AgentId,
    ) -> RegistryStoreResult<bool>;

    /// Returns an agent's events, oldest first.
    async fn events_for(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<RegistryEvent>>;
}

/// Errors returned by registry store implementations.
#[derive(Debug, Clone, Error)]
pub enum RegistryStoreError {
    /// A uniqueness or foreign-key constraint was violated.
    #[error("registry constraint violation: {0}")]
    Conflict(Arc<dyn std::error::Error + Send + Sync>),

    /// The agent does not exist.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted registry data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RegistryStoreError {
    /// Wraps a constraint violation.
    pub fn conflict(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Conflict(Arc::new(err))
    }

    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
