//! Pure provider matching over a candidate snapshot.
//!
//! The matcher never touches storage: callers load [`ProviderCandidate`]s
//! once and run every requirement of a registration against the same
//! snapshot.

use super::{
    Agent, AgentId, AgentStatus, Capability, DependencySpec, Namespace, ResolutionOutcome,
    ResolvedProvider, SelectionPolicy,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A capability together with the state of the agent exposing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCandidate {
    /// Provider agent.
    pub agent_id: AgentId,
    /// Provider health.
    pub status: AgentStatus,
    /// Provider namespace.
    pub namespace: Namespace,
    /// Endpoint built from the provider's host and port.
    pub endpoint: String,
    /// Provider's last heartbeat.
    pub heartbeat_at: DateTime<Utc>,
    /// The offered capability.
    pub capability: Capability,
    /// Number of resolutions currently bound to this capability.
    pub bound_consumers: u32,
}

impl ProviderCandidate {
    /// Builds a candidate from an agent and one of its capabilities.
    #[must_use]
    pub fn from_agent(agent: &Agent, capability: Capability, bound_consumers: u32) -> Self {
        Self {
            agent_id: agent.id().clone(),
            status: agent.status(),
            namespace: agent.namespace().clone(),
            endpoint: agent.endpoint(),
            heartbeat_at: agent.updated_at(),
            capability,
            bound_consumers,
        }
    }

    /// Returns whether the provider agent is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == AgentStatus::Healthy
    }

    /// Returns the binding stored on a consumer resolution.
    #[must_use]
    pub fn to_provider(&self) -> ResolvedProvider {
        ResolvedProvider {
            agent_id: self.agent_id.clone(),
            function_name: self.capability.function_name().to_owned(),
            capability: self.capability.capability().to_owned(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// A candidate that passed every filter, with its tag score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate<'a> {
    /// The surviving candidate.
    pub candidate: &'a ProviderCandidate,
    /// Tag score.
    pub score: u32,
}

/// Result of matching one requirement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome<'a> {
    /// The best provider.
    Matched(&'a ProviderCandidate),
    /// Providers of the capability exist but none qualifies.
    Unavailable,
    /// No provider of the capability exists.
    Unresolved,
}

impl MatchOutcome<'_> {
    /// Converts the match into a storable outcome.
    #[must_use]
    pub fn to_resolution_outcome(self) -> ResolutionOutcome {
        match self {
            Self::Matched(candidate) => ResolutionOutcome::Available(candidate.to_provider()),
            Self::Unavailable => ResolutionOutcome::Unavailable,
            Self::Unresolved => ResolutionOutcome::Unresolved,
        }
    }
}

/// Selects providers for capability requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityMatcher {
    policy: SelectionPolicy,
}

impl CapabilityMatcher {
    /// Creates a matcher using `policy` to break score ties.
    #[must_use]
    pub const fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    /// Returns the tie-break policy.
    #[must_use]
    pub const fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Selects the best provider for `spec`.
    #[must_use]
    pub fn select<'a>(
        &self,
        spec: &DependencySpec,
        consumer_namespace: &Namespace,
        candidates: &'a [ProviderCandidate],
    ) -> MatchOutcome<'a> {
        self.select_where(spec, consumer_namespace, candidates, |_| true)
    }

    /// Selects the best provider for `spec` among candidates accepted by
    /// `eligible`.
    #[must_use]
    pub fn select_where<'a>(
        &self,
        spec: &DependencySpec,
        consumer_namespace: &Namespace,
        candidates: &'a [ProviderCandidate],
        eligible: impl Fn(&ProviderCandidate) -> bool,
    ) -> MatchOutcome<'a> {
        let capability_exists = candidates
            .iter()
            .any(|candidate| candidate.capability.capability() == spec.capability);
        if !capability_exists {
            return MatchOutcome::Unresolved;
        }

        let namespace = spec.effective_namespace(consumer_namespace);
        let ranked = self.rank(
            spec,
            namespace,
            candidates.iter().filter(|candidate| eligible(*candidate)),
        );
        ranked
            .first()
            .map_or(MatchOutcome::Unavailable, |best| {
                MatchOutcome::Matched(best.candidate)
            })
    }

    /// Filters candidates for `spec` in `namespace` and orders survivors
    /// best-first.
    #[must_use]
    pub fn rank<'a>(
        &self,
        spec: &DependencySpec,
        namespace: &Namespace,
        candidates: impl IntoIterator<Item = &'a ProviderCandidate>,
    ) -> Vec<RankedCandidate<'a>> {
        let mut ranked: Vec<RankedCandidate<'a>> = candidates
            .into_iter()
            .filter(|candidate| {
                candidate.is_healthy()
                    && candidate.capability.capability() == spec.capability
                    && &candidate.namespace == namespace
                    && spec.version.matches(candidate.capability.version())
            })
            .filter_map(|candidate| {
                spec.tags
                    .score(candidate.capability.tags())
                    .map(|score| RankedCandidate { candidate, score })
            })
            .collect();
        ranked.sort_by(|left, right| self.compare(left, right));
        ranked
    }

    /// Orders two ranked candidates best-first.
    #[must_use]
    pub fn compare(&self, left: &RankedCandidate<'_>, right: &RankedCandidate<'_>) -> Ordering {
        right
            .score
            .cmp(&left.score)
            .then_with(|| self.policy_order(left.candidate, right.candidate))
            .then_with(|| left.candidate.agent_id.cmp(&right.candidate.agent_id))
            .then_with(|| {
                left.candidate
                    .capability
                    .function_name()
                    .cmp(right.candidate.capability.function_name())
            })
    }

    fn policy_order(&self, left: &ProviderCandidate, right: &ProviderCandidate) -> Ordering {
        match self.policy {
            SelectionPolicy::FirstHealthy => left
                .capability
                .created_at()
                .cmp(&right.capability.created_at()),
            SelectionPolicy::MostRecentHeartbeat => right.heartbeat_at.cmp(&left.heartbeat_at),
            SelectionPolicy::LeastLoaded => left.bound_consumers.cmp(&right.bound_consumers),
        }
    }
}
