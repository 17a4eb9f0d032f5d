//! LLM tool-filter and provider resolution.
//!
//! Only tools that publish an input schema can be handed to an LLM, so both
//! paths ignore candidates without one. Tool filters are evaluated across
//! the whole mesh; provider selectors follow the same namespace rule as
//! ordinary dependencies.

use crate::registry::domain::{
    Agent, Capability, CapabilityMatcher, DependencySpec, FilterEntry, FilterMode,
    LlmProviderResolution, LlmToolFilter, LlmToolResolution, MatchOutcome, ProviderCandidate,
    RankedCandidate, ResolutionId, ResolutionOutcome, ResolutionStatus, WILDCARD_CAPABILITY,
    parse_version,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Tool description handed to an LLM consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmToolInfo {
    /// Function name of the tool.
    pub name: String,
    /// Capability the tool exposes.
    pub capability: String,
    /// Tool description.
    pub description: Option<String>,
    /// JSON schema of the tool input.
    pub input_schema: Option<Value>,
    /// Tags advertised by the tool.
    pub tags: Vec<String>,
    /// Capability version.
    pub version: String,
    /// Endpoint to call.
    pub endpoint: String,
    /// Agent exposing the tool.
    pub agent_id: String,
}

impl LlmToolInfo {
    fn from_candidate(candidate: &ProviderCandidate) -> Self {
        let capability = &candidate.capability;
        Self {
            name: capability.function_name().to_owned(),
            capability: capability.capability().to_owned(),
            description: capability.description().map(str::to_owned),
            input_schema: capability.input_schema().cloned(),
            tags: capability.tags().to_vec(),
            version: capability.version().to_owned(),
            endpoint: candidate.endpoint.clone(),
            agent_id: candidate.agent_id.as_str().to_owned(),
        }
    }
}

/// Provider chosen for an LLM provider selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmProviderInfo {
    /// Provider agent.
    pub agent_id: String,
    /// Provider function name.
    pub name: String,
    /// Endpoint to call.
    pub endpoint: String,
    /// Capability the provider exposes.
    pub capability: String,
    /// Resolution status.
    pub status: ResolutionStatus,
    /// LLM vendor from the provider's keyword arguments.
    pub vendor: String,
    /// Provider tags.
    pub tags: Vec<String>,
    /// Provider capability version.
    pub version: String,
}

impl LlmProviderInfo {
    fn from_candidate(candidate: &ProviderCandidate) -> Self {
        let capability = &candidate.capability;
        Self {
            agent_id: candidate.agent_id.as_str().to_owned(),
            name: capability.function_name().to_owned(),
            endpoint: candidate.endpoint.clone(),
            capability: capability.capability().to_owned(),
            status: ResolutionStatus::Available,
            vendor: capability.vendor().to_owned(),
            tags: capability.tags().to_vec(),
            version: capability.version().to_owned(),
        }
    }
}

/// Rows and response entries produced for one consumer function's filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedToolFilter {
    /// Rows to store.
    pub rows: Vec<LlmToolResolution>,
    /// Tools for the response, deduplicated by function name.
    pub tools: Vec<LlmToolInfo>,
}

/// Row and response entry produced for one provider selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProviderSelector {
    /// Row to store.
    pub row: LlmProviderResolution,
    /// Chosen provider, if any.
    pub provider: Option<LlmProviderInfo>,
}

/// Resolves LLM tool filters and provider selectors against a candidate
/// snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmResolutionEngine {
    matcher: CapabilityMatcher,
}

impl LlmResolutionEngine {
    /// Creates an engine ranking ties with `matcher`.
    #[must_use]
    pub const fn new(matcher: CapabilityMatcher) -> Self {
        Self { matcher }
    }

    /// Resolves the tool filter declared by `capability` of `consumer`.
    #[must_use]
    pub fn resolve_tools(
        &self,
        consumer: &Agent,
        capability: &Capability,
        filter: &LlmToolFilter,
        candidates: &[ProviderCandidate],
        now: DateTime<Utc>,
    ) -> ResolvedToolFilter {
        let eligible: Vec<&ProviderCandidate> = candidates
            .iter()
            .filter(|candidate| candidate.is_healthy() && candidate.capability.input_schema().is_some())
            .collect();
        let row_for = RowFactory {
            consumer,
            capability,
            mode: filter.mode,
            now,
        };

        if filter.selects_everything() {
            let mut matches: Vec<RankedCandidate<'_>> = eligible
                .iter()
                .copied()
                .filter(|candidate| &candidate.agent_id != consumer.id())
                .map(|candidate| RankedCandidate {
                    candidate,
                    score: 0,
                })
                .collect();
            matches.sort_by(|left, right| self.matcher.compare(left, right));
            let wildcard = FilterEntry::capability(WILDCARD_CAPABILITY);
            let mut resolved = ResolvedToolFilter::default();
            let mut seen = HashSet::new();
            row_for.push_matches(&mut resolved, &mut seen, &wildcard, &matches);
            return resolved;
        }

        let mut resolved = ResolvedToolFilter::default();
        let mut seen = HashSet::new();
        for entry in &filter.entries {
            let mut matches: Vec<RankedCandidate<'_>> = eligible
                .iter()
                .copied()
                .filter_map(|candidate| {
                    entry
                        .score(
                            candidate.capability.capability(),
                            candidate.capability.version(),
                            candidate.capability.tags(),
                        )
                        .map(|score| RankedCandidate { candidate, score })
                })
                .collect();
            matches.sort_by(|left, right| self.matcher.compare(left, right));
            if filter.mode == FilterMode::BestMatch {
                matches = self.best_per_capability(matches);
            }
            row_for.push_matches(&mut resolved, &mut seen, entry, &matches);
        }
        resolved
    }

    /// Resolves the provider selector declared by `capability` of `consumer`.
    #[must_use]
    pub fn resolve_provider(
        &self,
        consumer: &Agent,
        capability: &Capability,
        spec: &DependencySpec,
        candidates: &[ProviderCandidate],
        now: DateTime<Utc>,
    ) -> ResolvedProviderSelector {
        let outcome = self.matcher.select_where(spec, consumer.namespace(), candidates, |candidate| {
            candidate.capability.input_schema().is_some()
        });
        let provider = match outcome {
            MatchOutcome::Matched(candidate) => Some(LlmProviderInfo::from_candidate(candidate)),
            MatchOutcome::Unavailable | MatchOutcome::Unresolved => None,
        };
        let stored = outcome.to_resolution_outcome();
        let resolved_at = stored.is_available().then_some(now);
        ResolvedProviderSelector {
            row: LlmProviderResolution {
                id: ResolutionId::new(),
                consumer_agent_id: consumer.id().clone(),
                consumer_function_name: capability.function_name().to_owned(),
                spec: spec.clone(),
                namespace: spec.effective_namespace(consumer.namespace()).clone(),
                outcome: stored,
                resolved_at,
            },
            provider,
        }
    }

    fn best_per_capability<'a>(
        &self,
        matches: Vec<RankedCandidate<'a>>,
    ) -> Vec<RankedCandidate<'a>> {
        let mut best: BTreeMap<String, RankedCandidate<'a>> = BTreeMap::new();
        for ranked in matches {
            let key = ranked.candidate.capability.capability().to_owned();
            let replace = best
                .get(&key)
                .is_none_or(|current| self.best_match_order(&ranked, current) == Ordering::Less);
            if replace {
                best.insert(key, ranked);
            }
        }
        best.into_values().collect()
    }

    /// Orders best-first by tag score, then semantic version, then tag count.
    fn best_match_order(&self, left: &RankedCandidate<'_>, right: &RankedCandidate<'_>) -> Ordering {
        let left_capability = &left.candidate.capability;
        let right_capability = &right.candidate.capability;
        right
            .score
            .cmp(&left.score)
            .then_with(|| {
                parse_version(right_capability.version())
                    .cmp(&parse_version(left_capability.version()))
            })
            .then_with(|| right_capability.tags().len().cmp(&left_capability.tags().len()))
            .then_with(|| self.matcher.compare(left, right))
    }
}

struct RowFactory<'a> {
    consumer: &'a Agent,
    capability: &'a Capability,
    mode: FilterMode,
    now: DateTime<Utc>,
}

impl RowFactory<'_> {
    fn row(&self, entry: &FilterEntry, outcome: ResolutionOutcome) -> LlmToolResolution {
        LlmToolResolution {
            id: ResolutionId::new(),
            consumer_agent_id: self.consumer.id().clone(),
            consumer_function_name: self.capability.function_name().to_owned(),
            filter_capability: entry.capability.clone(),
            filter_tags: entry.tags.to_flat_tags(),
            filter_mode: self.mode,
            outcome,
            resolved_at: self.now,
        }
    }

    fn push_matches(
        &self,
        resolved: &mut ResolvedToolFilter,
        seen: &mut HashSet<String>,
        entry: &FilterEntry,
        matches: &[RankedCandidate<'_>],
    ) {
        if matches.is_empty() {
            resolved
                .rows
                .push(self.row(entry, ResolutionOutcome::Unresolved));
            return;
        }
        for ranked in matches {
            let candidate = ranked.candidate;
            if !seen.insert(candidate.capability.function_name().to_owned()) {
                continue;
            }
            resolved.rows.push(self.row(
                entry,
                ResolutionOutcome::Available(candidate.to_provider()),
            ));
            resolved.tools.push(LlmToolInfo::from_candidate(candidate));
        }
    }
}
