//! Dependency resolution for consumer agents.
//!
//! [`ResolutionEngine`] is pure: it turns a consumer, its capabilities and a
//! candidate snapshot into resolution rows plus the maps returned to the
//! agent. [`ResolutionService`] loads that input from the store and writes
//! the rows back.

use super::llm::{LlmProviderInfo, LlmResolutionEngine, LlmToolInfo};
use crate::registry::{
    domain::{
        Agent, AgentId, Capability, CapabilityId, CapabilityMatcher, DependencyResolution,
        DependencySlot, MatchOutcome, ProviderCandidate, RegistryDomainError, ResolutionId,
        ResolutionOutcome, ResolutionSet, ResolutionStatus, SelectionPolicy,
    },
    ports::{RegistryStore, RegistryStoreError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// One dependency position as returned to agents.
///
/// Agents inject dependencies by position, so every declared position has
/// an entry. Unbound positions carry the required capability, the row
/// status and empty provider fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    /// Position in the consumer's dependency list.
    pub dep_index: u32,
    /// Provider agent; empty when unbound.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
    /// Provider function; empty when unbound.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub function_name: String,
    /// Endpoint to call; empty when unbound.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    /// Capability the provider exposes, or the required one when unbound.
    pub capability: String,
    /// Resolution status.
    pub status: ResolutionStatus,
}

impl ResolvedDependency {
    /// Builds the wire entry for a stored dependency row.
    #[must_use]
    pub fn from_row(row: &DependencyResolution) -> Self {
        row.outcome.provider().map_or_else(
            || Self {
                dep_index: row.dep_index,
                agent_id: String::new(),
                function_name: String::new(),
                endpoint: String::new(),
                capability: row.spec.capability.clone(),
                status: row.outcome.status(),
            },
            |provider| Self {
                dep_index: row.dep_index,
                agent_id: provider.agent_id.as_str().to_owned(),
                function_name: provider.function_name.clone(),
                endpoint: provider.endpoint.clone(),
                capability: provider.capability.clone(),
                status: ResolutionStatus::Available,
            },
        )
    }
}

/// Resolution maps returned after a registration or full heartbeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// Bound dependencies per consumer function.
    pub dependencies: BTreeMap<String, Vec<ResolvedDependency>>,
    /// Discovered tools per LLM-filtered function.
    pub llm_tools: BTreeMap<String, Vec<LlmToolInfo>>,
    /// Chosen provider per provider-selecting function.
    pub llm_providers: BTreeMap<String, LlmProviderInfo>,
    /// Number of declared dependency positions.
    pub total_dependencies: u32,
    /// Number of positions bound to a provider.
    pub dependencies_resolved: u32,
}

/// Rows and report computed for one consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedResolutions {
    /// Rows to store.
    pub set: ResolutionSet,
    /// Maps returned to the consumer.
    pub report: ResolutionReport,
}

/// Pure resolver for every requirement a consumer declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionEngine {
    matcher: CapabilityMatcher,
    llm: LlmResolutionEngine,
}

impl ResolutionEngine {
    /// Creates an engine breaking ties with `policy`.
    #[must_use]
    pub const fn new(policy: SelectionPolicy) -> Self {
        let matcher = CapabilityMatcher::new(policy);
        Self {
            matcher,
            llm: LlmResolutionEngine::new(matcher),
        }
    }

    /// Resolves dependencies, tool filters and provider selectors of
    /// `consumer`.
    #[must_use]
    pub fn resolve(
        &self,
        consumer: &Agent,
        capabilities: &[Capability],
        candidates: &[ProviderCandidate],
        now: DateTime<Utc>,
    ) -> ComputedResolutions {
        let mut computed = ComputedResolutions::default();

        for capability in capabilities {
            for (position, slot) in capability.dependencies().iter().enumerate() {
                let index = u32::try_from(position).unwrap_or(u32::MAX);
                if let Some(row) = self.resolve_slot(consumer, capability, index, slot, candidates, now)
                {
                    computed
                        .report
                        .dependencies
                        .entry(capability.function_name().to_owned())
                        .or_default()
                        .push(ResolvedDependency::from_row(&row));
                    computed.set.dependencies.push(row);
                }
            }

            if let Some(filter) = capability.llm_filter() {
                let resolved = self
                    .llm
                    .resolve_tools(consumer, capability, filter, candidates, now);
                computed
                    .report
                    .llm_tools
                    .insert(capability.function_name().to_owned(), resolved.tools);
                computed.set.llm_tools.extend(resolved.rows);
            }

            if let Some(spec) = capability.llm_provider() {
                let resolved = self
                    .llm
                    .resolve_provider(consumer, capability, spec, candidates, now);
                if let Some(provider) = resolved.provider {
                    computed
                        .report
                        .llm_providers
                        .insert(capability.function_name().to_owned(), provider);
                }
                computed.set.llm_providers.push(resolved.row);
            }
        }

        let (total, resolved) = computed.set.dependency_counts();
        computed.report.total_dependencies = total;
        computed.report.dependencies_resolved = resolved;
        computed
    }

    fn resolve_slot(
        &self,
        consumer: &Agent,
        capability: &Capability,
        index: u32,
        slot: &DependencySlot,
        candidates: &[ProviderCandidate],
        now: DateTime<Utc>,
    ) -> Option<DependencyResolution> {
        let primary = slot.primary()?;
        let mut chosen = (primary, None);
        for (position, spec) in slot.alternatives().iter().enumerate() {
            let outcome = self.matcher.select(spec, consumer.namespace(), candidates);
            if matches!(outcome, MatchOutcome::Matched(_)) {
                chosen = (spec, Some(outcome));
                break;
            }
            if position == 0 {
                chosen = (spec, Some(outcome));
            }
        }

        let (spec, outcome) = chosen;
        let stored = outcome.map_or(ResolutionOutcome::Unresolved, MatchOutcome::to_resolution_outcome);
        let resolved_at = stored.is_available().then_some(now);
        Some(DependencyResolution {
            id: ResolutionId::new(),
            consumer_agent_id: consumer.id().clone(),
            consumer_function_name: capability.function_name().to_owned(),
            dep_index: index,
            spec: spec.clone(),
            namespace: spec.effective_namespace(consumer.namespace()).clone(),
            outcome: stored,
            resolved_at,
        })
    }
}

/// Replaces the candidates of `agent` in a stored snapshot with candidates
/// built from `capabilities`, keeping known load counts.
#[must_use]
pub fn overlay_candidates(
    mut candidates: Vec<ProviderCandidate>,
    agent: &Agent,
    capabilities: &[Capability],
) -> Vec<ProviderCandidate> {
    let loads: HashMap<CapabilityId, u32> = candidates
        .iter()
        .filter(|candidate| &candidate.agent_id == agent.id())
        .map(|candidate| (candidate.capability.id(), candidate.bound_consumers))
        .collect();
    candidates.retain(|candidate| &candidate.agent_id != agent.id());
    candidates.extend(capabilities.iter().map(|capability| {
        let load = loads.get(&capability.id()).copied().unwrap_or_default();
        ProviderCandidate::from_agent(agent, capability.clone(), load)
    }));
    candidates
}

/// Service-level errors for resolution operations.
#[derive(Debug, Error)]
pub enum ResolutionServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] RegistryDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] RegistryStoreError),
}

/// Result type for resolution service operations.
pub type ResolutionServiceResult<T> = Result<T, ResolutionServiceError>;

/// Recomputes and stores consumer resolutions.
pub struct ResolutionService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    engine: ResolutionEngine,
}

impl<S, C> Clone for ResolutionService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            engine: self.engine,
        }
    }
}

impl<S, C> ResolutionService<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    /// Creates a resolution service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, policy: SelectionPolicy) -> Self {
        Self {
            store,
            clock,
            engine: ResolutionEngine::new(policy),
        }
    }

    /// Returns the pure engine.
    #[must_use]
    pub const fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    /// Recomputes every resolution of `consumer` against the current mesh.
    ///
    /// Returns `Ok(None)` when the consumer no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionServiceError`] when loading or storing fails.
    pub async fn recompute(
        &self,
        consumer: &AgentId,
    ) -> ResolutionServiceResult<Option<ResolutionReport>> {
        let Some(agent) = self.store.find_agent(consumer).await? else {
            return Ok(None);
        };
        let capabilities = self.store.capabilities_of(consumer).await?;
        let candidates = self.store.provider_candidates().await?;
        let computed = self
            .engine
            .resolve(&agent, &capabilities, &candidates, self.clock.utc());

        match self.store.replace_resolutions(consumer, &computed.set).await {
            Ok(()) => Ok(Some(computed.report)),
            Err(RegistryStoreError::AgentNotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Recomputes several consumers, logging and skipping failures.
    ///
    /// Returns the number of consumers recomputed.
    pub async fn recompute_all(&self, consumers: &[AgentId]) -> usize {
        let mut recomputed = 0;
        for consumer in consumers {
            match self.recompute(consumer).await {
                Ok(Some(report)) => {
                    recomputed += 1;
                    debug!(
                        agent_id = %consumer,
                        resolved = report.dependencies_resolved,
                        total = report.total_dependencies,
                        "recomputed consumer resolutions"
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(agent_id = %consumer, error = %err, "failed to recompute consumer resolutions");
                }
            }
        }
        recomputed
    }
}
