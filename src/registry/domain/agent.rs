//! Agent aggregate root.

use super::{AgentId, AgentStatus, AgentType, Namespace, RegistryDomainError, Runtime};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Version recorded when an agent omits one.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

/// Descriptive metadata an agent sends with each registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Human-readable agent name.
    pub name: String,
    /// Agent build version.
    pub version: String,
    /// Namespace used for dependency scoping.
    pub namespace: Namespace,
    /// Kind of agent.
    pub agent_type: AgentType,
    /// Optional SDK runtime.
    pub runtime: Option<Runtime>,
    /// Host the agent serves MCP on.
    pub http_host: String,
    /// Port the agent serves MCP on; `0` means stdio.
    pub http_port: u16,
}

impl AgentProfile {
    /// Creates a profile with defaults for everything but the name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_AGENT_VERSION.to_owned(),
            namespace: Namespace::default(),
            agent_type: AgentType::default(),
            runtime: None,
            http_host: String::new(),
            http_port: 0,
        }
    }

    /// Sets the agent type.
    #[must_use]
    pub const fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the runtime.
    #[must_use]
    pub const fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the HTTP host and port.
    #[must_use]
    pub fn with_http(mut self, host: impl Into<String>, port: u16) -> Self {
        self.http_host = host.into();
        self.http_port = port;
        self
    }
}

/// Builds the endpoint URL for an agent listening on `host:port`.
///
/// Port `0` denotes a stdio agent. Empty and wildcard hosts resolve to
/// `localhost` and any scheme already present on the host is dropped.
#[must_use]
pub fn build_endpoint(agent_id: &AgentId, host: &str, port: u16) -> String {
    if port == 0 {
        return format!("stdio://{agent_id}");
    }

    let trimmed = host.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let effective_host = match without_scheme {
        "" | "0.0.0.0" => "localhost",
        other => other,
    };
    format!("http://{effective_host}:{port}")
}

/// Result of applying a heartbeat or registration to an agent's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The agent was already healthy.
    Unchanged,
    /// The agent moved to healthy from the given status.
    Recovered {
        /// Status before the heartbeat.
        previous: AgentStatus,
    },
}

impl StatusTransition {
    /// Returns whether the agent became healthy.
    #[must_use]
    pub const fn is_recovery(self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

/// Registered agent aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    profile: AgentProfile,
    status: AgentStatus,
    total_dependencies: u32,
    dependencies_resolved: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_full_refresh: DateTime<Utc>,
}

/// Parameter object for reconstructing persisted agent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAgentData {
    /// Persisted agent identifier.
    pub id: AgentId,
    /// Persisted profile.
    pub profile: AgentProfile,
    /// Persisted status.
    pub status: AgentStatus,
    /// Persisted declared dependency count.
    pub total_dependencies: u32,
    /// Persisted resolved dependency count.
    pub dependencies_resolved: u32,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-heartbeat timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted timestamp of the last full registration or heartbeat.
    pub last_full_refresh: DateTime<Utc>,
}

impl Agent {
    /// Creates a newly registered, healthy agent.
    #[must_use]
    pub fn register(id: AgentId, profile: AgentProfile, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            profile,
            status: AgentStatus::Healthy,
            total_dependencies: 0,
            dependencies_resolved: 0,
            created_at: timestamp,
            updated_at: timestamp,
            last_full_refresh: timestamp,
        }
    }

    /// Reconstructs an agent from persistence.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::DependencyCountMismatch`] when the
    /// persisted counters are inconsistent.
    pub fn from_persisted(data: PersistedAgentData) -> Result<Self, RegistryDomainError> {
        check_counts(data.total_dependencies, data.dependencies_resolved)?;
        Ok(Self {
            id: data.id,
            profile: data.profile,
            status: data.status,
            total_dependencies: data.total_dependencies,
            dependencies_resolved: data.dependencies_resolved,
            created_at: data.created_at,
            updated_at: data.updated_at,
            last_full_refresh: data.last_full_refresh,
        })
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns the registration profile.
    #[must_use]
    pub const fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Returns the agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Returns the namespace.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.profile.namespace
    }

    /// Returns the agent type.
    #[must_use]
    pub const fn agent_type(&self) -> AgentType {
        self.profile.agent_type
    }

    /// Returns the health status.
    #[must_use]
    pub const fn status(&self) -> AgentStatus {
        self.status
    }

    /// Returns whether the agent can serve as a provider.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self.status, AgentStatus::Healthy)
    }

    /// Returns the number of declared dependencies.
    #[must_use]
    pub const fn total_dependencies(&self) -> u32 {
        self.total_dependencies
    }

    /// Returns the number of dependencies currently bound to a provider.
    #[must_use]
    pub const fn dependencies_resolved(&self) -> u32 {
        self.dependencies_resolved
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last heartbeat timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the timestamp of the last full registration or heartbeat.
    #[must_use]
    pub const fn last_full_refresh(&self) -> DateTime<Utc> {
        self.last_full_refresh
    }

    /// Returns the endpoint consumers should call.
    #[must_use]
    pub fn endpoint(&self) -> String {
        build_endpoint(&self.id, &self.profile.http_host, self.profile.http_port)
    }

    /// Applies a full registration or heartbeat carrying metadata.
    pub fn apply_registration(
        &mut self,
        profile: AgentProfile,
        clock: &impl Clock,
    ) -> StatusTransition {
        self.profile = profile;
        let transition = self.mark_healthy();
        let timestamp = clock.utc();
        self.updated_at = timestamp;
        self.last_full_refresh = timestamp;
        transition
    }

    /// Records a lightweight heartbeat.
    pub fn record_heartbeat(&mut self, clock: &impl Clock) -> StatusTransition {
        let transition = self.mark_healthy();
        self.updated_at = clock.utc();
        transition
    }

    /// Marks the agent unhealthy without touching its heartbeat timestamp.
    ///
    /// Returns `false` when the agent was already unhealthy.
    pub fn mark_unhealthy(&mut self) -> bool {
        if self.status == AgentStatus::Unhealthy {
            return false;
        }
        self.status = AgentStatus::Unhealthy;
        true
    }

    /// Copies status and heartbeat timestamp from a newer snapshot of the
    /// same agent, leaving profile and counters untouched.
    pub const fn sync_liveness(&mut self, observed: &Self) {
        self.status = observed.status;
        self.updated_at = observed.updated_at;
    }

    /// Stores dependency counters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::DependencyCountMismatch`] when
    /// `resolved` exceeds `total`.
    pub fn set_dependency_counts(
        &mut self,
        total: u32,
        resolved: u32,
    ) -> Result<(), RegistryDomainError> {
        check_counts(total, resolved)?;
        self.total_dependencies = total;
        self.dependencies_resolved = resolved;
        Ok(())
    }

    /// Returns whether the last heartbeat is older than `threshold` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.updated_at < now - threshold
    }

    fn mark_healthy(&mut self) -> StatusTransition {
        let previous = self.status;
        self.status = AgentStatus::Healthy;
        if previous == AgentStatus::Healthy {
            StatusTransition::Unchanged
        } else {
            StatusTransition::Recovered { previous }
        }
    }
}

const fn check_counts(total: u32, resolved: u32) -> Result<(), RegistryDomainError> {
    if resolved > total {
        return Err(RegistryDomainError::DependencyCountMismatch { resolved, total });
    }
    Ok(())
}
