//! Registration, heartbeat and discovery orchestration.
//!
//! Provides [`RegistryService`], which validates agent payloads, commits
//! each registration or full heartbeat as one store transaction and
//! re-resolves consumers whose providers appeared, changed or left.

use super::resolution::{ResolutionReport, ResolutionService, overlay_candidates};
use crate::registry::{
    domain::{
        Agent, AgentId, AgentProfile, AgentStatus, AgentType, Capability, DEFAULT_AGENT_VERSION,
        Namespace, RegistryDomainError, RegistryEvent, RegistryEventType, ResolutionSet, Runtime,
        SelectionPolicy, StatusTransition, ToolDeclaration, reconcile_capabilities,
        validate_tools,
    },
    ports::{RegistrationCommit, RegistryStore, RegistryStoreError, TransitionOutcome},
};
use mockable::Clock;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Agent metadata carried by registrations and full heartbeats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentMetadata {
    name: Option<String>,
    agent_type: AgentType,
    namespace: Option<String>,
    version: Option<String>,
    runtime: Option<Runtime>,
    http_host: String,
    http_port: u16,
    tools: Vec<ToolDeclaration>,
}

impl AgentMetadata {
    /// Creates empty metadata; the agent name defaults to its identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the agent name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the agent type.
    #[must_use]
    pub const fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the agent version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the SDK runtime.
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

    /// Appends a tool declaration.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolDeclaration) -> Self {
        self.tools.push(tool);
        self
    }

    /// Replaces the tool declarations.
    #[must_use]
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolDeclaration>) -> Self {
        self.tools = tools.into_iter().collect();
        self
    }

    /// Returns whether any tool is declared.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    fn into_parts(
        self,
        agent_id: &AgentId,
    ) -> Result<(AgentProfile, Vec<ToolDeclaration>), RegistryDomainError> {
        let Self {
            name,
            agent_type,
            namespace,
            version,
            runtime,
            http_host,
            http_port,
            tools,
        } = self;

        let resolved_namespace = Namespace::or_default(namespace.as_deref())?;
        if tools.is_empty() && agent_type.requires_tools() {
            return Err(RegistryDomainError::NoTools(agent_id.as_str().to_owned()));
        }
        validate_tools(&tools)?;

        let display_name = name
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| agent_id.as_str().to_owned());
        let agent_version = version
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AGENT_VERSION.to_owned());
        let mut profile = AgentProfile::named(display_name)
            .with_agent_type(agent_type)
            .with_namespace(resolved_namespace)
            .with_version(agent_version)
            .with_http(http_host, http_port);
        if let Some(value) = runtime {
            profile = profile.with_runtime(value);
        }
        Ok((profile, tools))
    }
}

/// Request payload for `POST /agents/register`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRegistration {
    agent_id: String,
    metadata: AgentMetadata,
}

impl AgentRegistration {
    /// Creates a registration request.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, metadata: AgentMetadata) -> Self {
        Self {
            agent_id: agent_id.into(),
            metadata,
        }
    }
}

/// Request payload for `POST /heartbeat`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRequest {
    agent_id: String,
    metadata: Option<AgentMetadata>,
}

impl HeartbeatRequest {
    /// Creates a lightweight heartbeat.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            metadata: None,
        }
    }

    /// Attaches registration metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: AgentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filters for agent listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentQuery {
    namespace: Option<String>,
    agent_type: Option<AgentType>,
    capabilities: Vec<String>,
    fuzzy_match: bool,
}

impl AgentQuery {
    /// Creates a query matching every agent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps agents in `namespace`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Keeps agents of `agent_type`.
    #[must_use]
    pub const fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = Some(agent_type);
        self
    }

    /// Keeps agents exposing any of `capabilities`.
    #[must_use]
    pub fn with_capabilities<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities = capabilities
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.trim().is_empty())
            .collect();
        self
    }

    /// Matches capability names by case-insensitive substring.
    #[must_use]
    pub const fn with_fuzzy_match(mut self, fuzzy_match: bool) -> Self {
        self.fuzzy_match = fuzzy_match;
        self
    }

    fn accepts(&self, agent: &Agent, capabilities: &[Capability]) -> bool {
        if self
            .namespace
            .as_deref()
            .is_some_and(|namespace| agent.namespace().as_str() != namespace)
        {
            return false;
        }
        if self
            .agent_type
            .is_some_and(|agent_type| agent.agent_type() != agent_type)
        {
            return false;
        }
        if self.capabilities.is_empty() {
            return true;
        }
        capabilities.iter().any(|capability| {
            self.capabilities
                .iter()
                .any(|wanted| self.capability_matches(wanted, capability.capability()))
        })
    }

    fn capability_matches(&self, wanted: &str, offered: &str) -> bool {
        if self.fuzzy_match {
            offered
                .to_lowercase()
                .contains(&wanted.trim().to_lowercase())
        } else {
            offered == wanted.trim()
        }
    }
}

/// Agent with its capabilities and consumer-side resolutions.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    /// The agent.
    pub agent: Agent,
    /// Capabilities in declaration order.
    pub capabilities: Vec<Capability>,
    /// Resolutions the agent holds as a consumer.
    pub resolutions: ResolutionSet,
}

/// Result of a registration or full heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    /// Agent as committed.
    pub agent: Agent,
    /// Resolution maps for the response.
    pub report: ResolutionReport,
    /// Event written for the commit.
    pub event_type: RegistryEventType,
}

/// Result of `POST /heartbeat`.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    /// The heartbeat carried tools and was committed like a registration.
    Full(RegistrationOutcome),
    /// Only the heartbeat timestamp was refreshed.
    Touched(Agent),
}

/// Result of the `HEAD /heartbeat/{agent_id}` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastHeartbeatStatus {
    /// The agent is unknown and must register again.
    Gone,
    /// The mesh changed since the agent's last full refresh.
    TopologyChanged,
    /// Nothing changed.
    Unchanged,
}

/// Service-level errors for registry operations.
#[derive(Debug, Error)]
pub enum RegistryServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] RegistryDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] RegistryStoreError),
    /// The agent is not registered.
    #[error("agent not found: {0}")]
    NotFound(AgentId),
}

/// Result type for registry service operations.
pub type RegistryServiceResult<T> = Result<T, RegistryServiceError>;

/// Registration, heartbeat and discovery orchestration service.
pub struct RegistryService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    resolver: ResolutionService<S, C>,
}

#[derive(Clone, Copy)]
enum CommitKind {
    Registration,
    Heartbeat,
}

impl<S, C> Clone for RegistryService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, C> RegistryService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    /// Creates a registry service choosing providers with `policy`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, policy: SelectionPolicy) -> Self {
        let resolver = ResolutionService::new(Arc::clone(&store), Arc::clone(&clock), policy);
        Self {
            store,
            clock,
            resolver,
        }
    }

    /// Registers an agent or replaces its metadata and tools.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Domain`] when the payload is invalid
    /// and [`RegistryServiceError::Store`] when the commit fails.
    pub async fn register(
        &self,
        request: AgentRegistration,
    ) -> RegistryServiceResult<RegistrationOutcome> {
        let agent_id = AgentId::new(request.agent_id)?;
        let (profile, tools) = request.metadata.into_parts(&agent_id)?;
        let existing = self.store.find_agent(&agent_id).await?;
        self.commit_full(agent_id, profile, tools, existing, CommitKind::Registration)
            .await
    }

    /// Handles a heartbeat.
    ///
    /// Unknown agents carrying metadata are registered. Known agents
    /// carrying tools get a full update; anything else is a lightweight
    /// touch of the heartbeat timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::NotFound`] for an unknown agent
    /// without metadata, [`RegistryServiceError::Domain`] for invalid input
    /// and [`RegistryServiceError::Store`] when persistence fails.
    pub async fn heartbeat(
        &self,
        request: HeartbeatRequest,
    ) -> RegistryServiceResult<HeartbeatOutcome> {
        let agent_id = AgentId::new(request.agent_id)?;
        let existing = self.store.find_agent(&agent_id).await?;

        match (existing, request.metadata) {
            (None, None) => Err(RegistryServiceError::NotFound(agent_id)),
            (None, Some(metadata)) => {
                let (profile, tools) = metadata.into_parts(&agent_id)?;
                let outcome = self
                    .commit_full(agent_id, profile, tools, None, CommitKind::Heartbeat)
                    .await?;
                Ok(HeartbeatOutcome::Full(outcome))
            }
            (Some(agent), Some(metadata)) if metadata.has_tools() => {
                let (profile, tools) = metadata.into_parts(&agent_id)?;
                let outcome = self
                    .commit_full(agent_id, profile, tools, Some(agent), CommitKind::Heartbeat)
                    .await?;
                Ok(HeartbeatOutcome::Full(outcome))
            }
            (Some(agent), _) => {
                let (touched, _) = self.touch(agent).await?;
                Ok(HeartbeatOutcome::Touched(touched))
            }
        }
    }

    /// Refreshes an agent's heartbeat and reports whether it must re-fetch
    /// its resolutions.
    ///
    /// Malformed identifiers are reported as [`FastHeartbeatStatus::Gone`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Store`] when the store fails.
    pub async fn fast_heartbeat_check(
        &self,
        raw_agent_id: &str,
    ) -> RegistryServiceResult<FastHeartbeatStatus> {
        let Ok(agent_id) = AgentId::new(raw_agent_id) else {
            return Ok(FastHeartbeatStatus::Gone);
        };
        let Some(agent) = self.store.find_agent(&agent_id).await? else {
            return Ok(FastHeartbeatStatus::Gone);
        };

        let (touched, transition) = match self.touch(agent).await {
            Ok(result) => result,
            Err(RegistryServiceError::Store(RegistryStoreError::AgentNotFound(_))) => {
                return Ok(FastHeartbeatStatus::Gone);
            }
            Err(err) => return Err(err),
        };
        if transition.is_recovery() {
            return Ok(FastHeartbeatStatus::TopologyChanged);
        }

        let changed = self
            .store
            .has_topology_events_since(touched.last_full_refresh(), touched.id())
            .await?;
        Ok(if changed {
            FastHeartbeatStatus::TopologyChanged
        } else {
            FastHeartbeatStatus::Unchanged
        })
    }

    /// Gracefully unregisters an agent.
    ///
    /// The agent is marked unhealthy and every resolution it provides is
    /// detached; affected consumers are re-resolved. Unknown or already
    /// unhealthy agents are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Domain`] for a malformed identifier
    /// and [`RegistryServiceError::Store`] when persistence fails.
    pub async fn unregister(&self, raw_agent_id: &str) -> RegistryServiceResult<()> {
        let agent_id = AgentId::new(raw_agent_id)?;
        let Some(agent) = self.store.find_agent(&agent_id).await? else {
            debug!(agent_id = %agent_id, "unregister for unknown agent ignored");
            return Ok(());
        };

        let event = agent.agent_type().emits_status_events().then(|| {
            RegistryEvent::new(
                agent_id.clone(),
                RegistryEventType::Unregister,
                json!({
                    "reason": "graceful_shutdown",
                    "previous_status": agent.status().as_str(),
                }),
                &*self.clock,
            )
        });
        match self.store.mark_unhealthy(&agent_id, None, event).await? {
            TransitionOutcome::Applied { affected_consumers } => {
                info!(
                    agent_id = %agent_id,
                    affected = affected_consumers.len(),
                    "agent unregistered"
                );
                self.resolver.recompute_all(&affected_consumers).await;
            }
            TransitionOutcome::Skipped => {
                debug!(agent_id = %agent_id, "agent already unhealthy");
            }
        }
        Ok(())
    }

    /// Lists agents matching `query`, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Store`] when persistence lookup fails.
    pub async fn list_agents(&self, query: &AgentQuery) -> RegistryServiceResult<Vec<AgentView>> {
        let mut views = Vec::new();
        for agent in self.store.list_agents().await? {
            let capabilities = self.store.capabilities_of(agent.id()).await?;
            if !query.accepts(&agent, &capabilities) {
                continue;
            }
            let resolutions = self.store.resolutions_of(agent.id()).await?;
            views.push(AgentView {
                agent,
                capabilities,
                resolutions,
            });
        }
        Ok(views)
    }

    /// Returns an agent's events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Domain`] for a malformed identifier
    /// and [`RegistryServiceError::Store`] when persistence lookup fails.
    pub async fn agent_events(&self, raw_agent_id: &str) -> RegistryServiceResult<Vec<RegistryEvent>> {
        let agent_id = AgentId::new(raw_agent_id)?;
        Ok(self.store.events_for(&agent_id).await?)
    }

    async fn commit_full(
        &self,
        agent_id: AgentId,
        profile: AgentProfile,
        tools: Vec<ToolDeclaration>,
        existing: Option<Agent>,
        kind: CommitKind,
    ) -> RegistryServiceResult<RegistrationOutcome> {
        let clock = &*self.clock;
        let created = existing.is_none();
        let (mut agent, transition, stored) = match existing {
            Some(mut current) => {
                let transition = current.apply_registration(profile, clock);
                let stored = self.store.capabilities_of(current.id()).await?;
                (current, transition, stored)
            }
            None => (
                Agent::register(agent_id, profile, clock),
                StatusTransition::Unchanged,
                Vec::new(),
            ),
        };

        let capabilities = reconcile_capabilities(&stored, tools, clock);
        let candidates = overlay_candidates(
            self.store.provider_candidates().await?,
            &agent,
            &capabilities.desired,
        );
        let computed = self.resolver.engine().resolve(
            &agent,
            &capabilities.desired,
            &candidates,
            clock.utc(),
        );
        agent.set_dependency_counts(
            computed.report.total_dependencies,
            computed.report.dependencies_resolved,
        )?;

        let event_type = commit_event_type(
            kind,
            created,
            transition,
            agent.agent_type(),
            capabilities.has_changes(),
        );
        let event = RegistryEvent::new(
            agent.id().clone(),
            event_type,
            registration_event_data(&agent, capabilities.desired.len(), transition),
            clock,
        );
        let commit = RegistrationCommit {
            agent,
            capabilities,
            resolutions: computed.set,
            events: vec![event],
        };
        let detached = self.store.commit_registration(&commit).await?;
        let RegistrationCommit {
            agent: committed,
            capabilities: committed_capabilities,
            ..
        } = commit;

        info!(
            agent_id = %committed.id(),
            event = %event_type,
            tools = committed_capabilities.desired.len(),
            resolved = computed.report.dependencies_resolved,
            total = computed.report.total_dependencies,
            "agent registration committed"
        );

        if event_type.is_topology_change() {
            let mut consumers: BTreeSet<AgentId> = detached.into_iter().collect();
            consumers.extend(
                self.awaiting_consumers(&committed, &committed_capabilities.desired)
                    .await?,
            );
            let ordered: Vec<AgentId> = consumers.into_iter().collect();
            self.resolver.recompute_all(&ordered).await;
        }

        Ok(RegistrationOutcome {
            agent: committed,
            report: computed.report,
            event_type,
        })
    }

    async fn touch(&self, mut agent: Agent) -> RegistryServiceResult<(Agent, StatusTransition)> {
        let transition = agent.record_heartbeat(&*self.clock);
        let recovered = transition.is_recovery();
        let events: Vec<RegistryEvent> = (recovered
            && agent.agent_type().emits_status_events())
        .then(|| {
            RegistryEvent::new(
                agent.id().clone(),
                RegistryEventType::Register,
                recovery_event_data(transition),
                &*self.clock,
            )
        })
        .into_iter()
        .collect();
        self.store.update_agent(&agent, &events).await?;

        if recovered {
            info!(agent_id = %agent.id(), "agent recovered");
            let capabilities = self.store.capabilities_of(agent.id()).await?;
            let consumers = self.awaiting_consumers(&agent, &capabilities).await?;
            self.resolver.recompute_all(&consumers).await;
        }
        Ok((agent, transition))
    }

    async fn awaiting_consumers(
        &self,
        provider: &Agent,
        capabilities: &[Capability],
    ) -> RegistryServiceResult<Vec<AgentId>> {
        let names: Vec<String> = capabilities
            .iter()
            .map(|capability| capability.capability().to_owned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.consumers_awaiting(&names, provider.id()).await?)
    }
}

const fn commit_event_type(
    kind: CommitKind,
    created: bool,
    transition: StatusTransition,
    agent_type: AgentType,
    capabilities_changed: bool,
) -> RegistryEventType {
    if created || matches!(kind, CommitKind::Registration) {
        return RegistryEventType::Register;
    }
    if transition.is_recovery() && agent_type.emits_status_events() {
        return RegistryEventType::Register;
    }
    if capabilities_changed {
        RegistryEventType::Update
    } else {
        RegistryEventType::Heartbeat
    }
}

fn registration_event_data(agent: &Agent, tool_count: usize, transition: StatusTransition) -> Value {
    let mut data = json!({
        "name": agent.name(),
        "version": agent.profile().version,
        "agent_type": agent.agent_type().as_str(),
        "namespace": agent.namespace().as_str(),
        "endpoint": agent.endpoint(),
        "tool_count": tool_count,
    });
    if let (StatusTransition::Recovered { previous }, Some(object)) =
        (transition, data.as_object_mut())
    {
        object.insert("previous_status".to_owned(), json!(previous.as_str()));
    }
    data
}

fn recovery_event_data(transition: StatusTransition) -> Value {
    let previous = match transition {
        StatusTransition::Recovered { previous } => previous,
        StatusTransition::Unchanged => AgentStatus::Healthy,
    };
    json!({
        "reason": "heartbeat_recovered",
        "previous_status": previous.as_str(),
    })
}
