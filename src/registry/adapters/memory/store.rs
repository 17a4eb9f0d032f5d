//! In-memory registry store.

use crate::registry::{
    domain::{
        Agent, AgentId, AgentStatus, Capability, ProviderCandidate, RegistryEvent,
        ResolutionOutcome, ResolutionSet, ResolvedProvider,
    },
    ports::{
        RegistrationCommit, RegistryStore, RegistryStoreError, RegistryStoreResult, StatusGuard,
        TransitionOutcome,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory registry store.
///
/// Each operation holds a single write guard, which gives the same
/// all-or-nothing behaviour as a database transaction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryStore {
    state: Arc<RwLock<InMemoryRegistryState>>,
}

#[derive(Debug, Default)]
struct InMemoryRegistryState {
    agents: BTreeMap<AgentId, Agent>,
    capabilities: HashMap<AgentId, Vec<Capability>>,
    resolutions: HashMap<AgentId, ResolutionSet>,
    events: Vec<RegistryEvent>,
}

impl InMemoryRegistryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RegistryStoreResult<RwLockReadGuard<'_, InMemoryRegistryState>> {
        self.state
            .read()
            .map_err(|err| RegistryStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> RegistryStoreResult<RwLockWriteGuard<'_, InMemoryRegistryState>> {
        self.state
            .write()
            .map_err(|err| RegistryStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

impl InMemoryRegistryState {
    fn bound_consumers(&self, provider: &AgentId, function_name: &str) -> u32 {
        let binds = |outcome: &ResolutionOutcome| {
            outcome.provider().is_some_and(|bound| {
                &bound.agent_id == provider && bound.function_name == function_name
            })
        };
        let count = self
            .resolutions
            .values()
            .map(|set| {
                set.dependencies
                    .iter()
                    .filter(|row| binds(&row.outcome))
                    .count()
                    + set
                        .llm_providers
                        .iter()
                        .filter(|row| binds(&row.outcome))
                        .count()
            })
            .sum::<usize>();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn store_resolutions(&mut self, agent_id: &AgentId, incoming: &ResolutionSet) {
        let previous = self.resolutions.remove(agent_id).unwrap_or_default();
        let dependency_ids: HashMap<(&str, u32), _> = previous
            .dependencies
            .iter()
            .map(|row| (row.key(), row.id))
            .collect();
        let provider_ids: HashMap<&str, _> = previous
            .llm_providers
            .iter()
            .map(|row| (row.consumer_function_name.as_str(), row.id))
            .collect();

        let mut next = incoming.clone();
        for row in &mut next.dependencies {
            let existing = dependency_ids.get(&row.key()).copied();
            if let Some(id) = existing {
                row.id = id;
            }
        }
        for row in &mut next.llm_providers {
            let existing = provider_ids
                .get(row.consumer_function_name.as_str())
                .copied();
            if let Some(id) = existing {
                row.id = id;
            }
        }
        self.resolutions.insert(agent_id.clone(), next);
    }

    fn refresh_counts(&mut self, agent_id: &AgentId) -> RegistryStoreResult<()> {
        let (total, resolved) = self
            .resolutions
            .get(agent_id)
            .map(ResolutionSet::dependency_counts)
            .unwrap_or_default();
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent
                .set_dependency_counts(total, resolved)
                .map_err(RegistryStoreError::invalid_persisted_data)?;
        }
        Ok(())
    }

    /// Detaches resolutions bound to `provider`, optionally only those bound
    /// to `functions`, and returns the affected consumers.
    fn detach_provider(
        &mut self,
        provider: &AgentId,
        functions: Option<&HashSet<String>>,
    ) -> RegistryStoreResult<Vec<AgentId>> {
        let binds = |bound: &ResolvedProvider| {
            &bound.agent_id == provider
                && functions.is_none_or(|names| names.contains(&bound.function_name))
        };

        let mut affected = BTreeSet::new();
        for (consumer, set) in &mut self.resolutions {
            let mut touched = false;
            for row in &mut set.dependencies {
                if row.outcome.provider().is_some_and(binds) {
                    row.outcome = row.outcome.detached();
                    row.resolved_at = None;
                    touched = true;
                }
            }
            for row in &mut set.llm_tools {
                if row.outcome.provider().is_some_and(binds) {
                    row.outcome = row.outcome.detached();
                    touched = true;
                }
            }
            for row in &mut set.llm_providers {
                if row.outcome.provider().is_some_and(binds) {
                    row.outcome = row.outcome.detached();
                    row.resolved_at = None;
                    touched = true;
                }
            }
            if touched && consumer != provider {
                affected.insert(consumer.clone());
            }
        }

        for consumer in &affected {
            self.refresh_counts(consumer)?;
        }
        Ok(affected.into_iter().collect())
    }

    fn guard_holds(&self, agent_id: &AgentId, guard: Option<StatusGuard>) -> bool {
        self.agents.get(agent_id).is_some_and(|agent| {
            guard.is_none_or(|expected| {
                agent.updated_at() == expected.updated_at && agent.status() == expected.status
            })
        })
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn ping(&self) -> RegistryStoreResult<()> {
        self.read().map(|_| ())
    }

    async fn find_agent(&self, agent_id: &AgentId) -> RegistryStoreResult<Option<Agent>> {
        let state = self.read()?;
        Ok(state.agents.get(agent_id).cloned())
    }

    async fn list_agents(&self) -> RegistryStoreResult<Vec<Agent>> {
        let state = self.read()?;
        Ok(state.agents.values().cloned().collect())
    }

    async fn stale_agents(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[AgentStatus],
    ) -> RegistryStoreResult<Vec<Agent>> {
        let state = self.read()?;
        Ok(state
            .agents
            .values()
            .filter(|agent| statuses.contains(&agent.status()) && agent.updated_at() < cutoff)
            .cloned()
            .collect())
    }

    async fn capabilities_of(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<Capability>> {
        let state = self.read()?;
        Ok(state.capabilities.get(agent_id).cloned().unwrap_or_default())
    }

    async fn provider_candidates(&self) -> RegistryStoreResult<Vec<ProviderCandidate>> {
        let state = self.read()?;
        let mut candidates = Vec::new();
        for agent in state.agents.values() {
            for capability in state.capabilities.get(agent.id()).into_iter().flatten() {
                let bound = state.bound_consumers(agent.id(), capability.function_name());
                candidates.push(ProviderCandidate::from_agent(
                    agent,
                    capability.clone(),
                    bound,
                ));
            }
        }
        Ok(candidates)
    }

    async fn resolutions_of(&self, agent_id: &AgentId) -> RegistryStoreResult<ResolutionSet> {
        let state = self.read()?;
        Ok(state.resolutions.get(agent_id).cloned().unwrap_or_default())
    }

    async fn commit_registration(
        &self,
        commit: &RegistrationCommit,
    ) -> RegistryStoreResult<Vec<AgentId>> {
        let mut state = self.write()?;
        let agent_id = commit.agent.id().clone();

        let removed_functions: HashSet<String> = state
            .capabilities
            .get(&agent_id)
            .into_iter()
            .flatten()
            .filter(|capability| commit.capabilities.deleted.contains(&capability.id()))
            .map(|capability| capability.function_name())
            .chain(commit.capabilities.updated_functions())
            .map(str::to_owned)
            .collect();

        // Detach before storing the agent's own rows, which may bind to its
        // updated tools.
        let detached = if removed_functions.is_empty() {
            Vec::new()
        } else {
            state.detach_provider(&agent_id, Some(&removed_functions))?
        };

        state.agents.insert(agent_id.clone(), commit.agent.clone());
        state
            .capabilities
            .insert(agent_id.clone(), commit.capabilities.desired.clone());
        state.store_resolutions(&agent_id, &commit.resolutions);
        state.events.extend(commit.events.iter().cloned());
        Ok(detached)
    }

    async fn replace_resolutions(
        &self,
        agent_id: &AgentId,
        resolutions: &ResolutionSet,
    ) -> RegistryStoreResult<()> {
        let mut state = self.write()?;
        if !state.agents.contains_key(agent_id) {
            return Err(RegistryStoreError::AgentNotFound(agent_id.clone()));
        }
        state.store_resolutions(agent_id, resolutions);
        state.refresh_counts(agent_id)
    }

    async fn update_agent(
        &self,
        agent: &Agent,
        events: &[RegistryEvent],
    ) -> RegistryStoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .agents
            .get_mut(agent.id())
            .ok_or_else(|| RegistryStoreError::AgentNotFound(agent.id().clone()))?;
        stored.sync_liveness(agent);
        state.events.extend(events.iter().cloned());
        Ok(())
    }

    async fn mark_unhealthy(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
        event: Option<RegistryEvent>,
    ) -> RegistryStoreResult<TransitionOutcome> {
        let mut state = self.write()?;
        if !state.guard_holds(agent_id, guard) {
            return Ok(TransitionOutcome::Skipped);
        }
        let changed = state
            .agents
            .get_mut(agent_id)
            .is_some_and(Agent::mark_unhealthy);
        if !changed {
            return Ok(TransitionOutcome::Skipped);
        }

        state.events.extend(event);
        let affected_consumers = state.detach_provider(agent_id, None)?;
        Ok(TransitionOutcome::Applied { affected_consumers })
    }

    async fn remove_agent(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
    ) -> RegistryStoreResult<TransitionOutcome> {
        let mut state = self.write()?;
        if !state.guard_holds(agent_id, guard) {
            return Ok(TransitionOutcome::Skipped);
        }

        state.agents.remove(agent_id);
        state.capabilities.remove(agent_id);
        state.resolutions.remove(agent_id);
        state.events.retain(|event| event.agent_id() != agent_id);
        let affected_consumers = state.detach_provider(agent_id, None)?;
        Ok(TransitionOutcome::Applied { affected_consumers })
    }

    async fn consumers_awaiting(
        &self,
        capabilities: &[String],
        exclude: &AgentId,
    ) -> RegistryStoreResult<Vec<AgentId>> {
        let state = self.read()?;
        let wanted = |capability: &str| capabilities.iter().any(|name| name == capability);
        Ok(state
            .resolutions
            .iter()
            .filter(|(consumer, _)| *consumer != exclude)
            .filter(|(_, set)| {
                set.dependencies
                    .iter()
                    .any(|row| !row.outcome.is_available() && wanted(&row.spec.capability))
                    || set
                        .llm_providers
                        .iter()
                        .any(|row| !row.outcome.is_available() && wanted(&row.spec.capability))
            })
            .map(|(consumer, _)| consumer.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn has_topology_events_since(
        &self,
        since: DateTime<Utc>,
        exclude: &AgentId,
    ) -> RegistryStoreResult<bool> {
        let state = self.read()?;
        Ok(state.events.iter().any(|event| {
            event.agent_id() != exclude
                && event.timestamp() > since
                && event.event_type().is_topology_change()
        }))
    }

    async fn events_for(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<RegistryEvent>> {
        let state = self.read()?;
        Ok(state
            .events
            .iter()
            .filter(|event| event.agent_id() == agent_id)
            .cloned()
            .collect())
    }
}
