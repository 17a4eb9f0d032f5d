//! Resolution records binding consumers to providers.

use super::{
    AgentId, DependencySpec, FilterMode, Namespace, ParseResolutionStatusError,
    RegistryDomainError, ResolutionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored status of a resolution row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Bound to a healthy provider.
    Available,
    /// The capability exists but no healthy provider qualifies.
    Unavailable,
    /// No provider of the capability exists.
    Unresolved,
}

impl ResolutionStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ResolutionStatus {
    type Error = ParseResolutionStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "unresolved" => Ok(Self::Unresolved),
            _ => Err(ParseResolutionStatusError(value.to_owned())),
        }
    }
}

/// Provider a resolution is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProvider {
    /// Provider agent.
    pub agent_id: AgentId,
    /// Provider function.
    pub function_name: String,
    /// Capability the provider function exposes.
    pub capability: String,
    /// Endpoint to call.
    pub endpoint: String,
}

/// Outcome of matching one requirement.
///
/// A provider is present exactly when the outcome is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// Bound to a provider.
    Available(ResolvedProvider),
    /// The capability exists but no provider qualifies.
    Unavailable,
    /// No provider of the capability exists.
    Unresolved,
}

/// Nullable provider columns as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProviderColumns {
    /// Provider agent column.
    pub agent_id: Option<String>,
    /// Provider function column.
    pub function_name: Option<String>,
    /// Provider capability column.
    pub capability: Option<String>,
    /// Endpoint column.
    pub endpoint: Option<String>,
}

impl ResolutionOutcome {
    /// Returns the stored status.
    #[must_use]
    pub const fn status(&self) -> ResolutionStatus {
        match self {
            Self::Available(_) => ResolutionStatus::Available,
            Self::Unavailable => ResolutionStatus::Unavailable,
            Self::Unresolved => ResolutionStatus::Unresolved,
        }
    }

    /// Returns the bound provider.
    #[must_use]
    pub const fn provider(&self) -> Option<&ResolvedProvider> {
        match self {
            Self::Available(provider) => Some(provider),
            Self::Unavailable | Self::Unresolved => None,
        }
    }

    /// Returns whether the outcome is bound to a provider.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Returns the provider columns for storage.
    #[must_use]
    pub fn to_columns(&self) -> StoredProviderColumns {
        self.provider()
            .map_or_else(StoredProviderColumns::default, |provider| {
                StoredProviderColumns {
                    agent_id: Some(provider.agent_id.as_str().to_owned()),
                    function_name: Some(provider.function_name.clone()),
                    capability: Some(provider.capability.clone()),
                    endpoint: Some(provider.endpoint.clone()),
                }
            })
    }

    /// Rebuilds an outcome from stored columns.
    ///
    /// `fallback_capability` fills the capability column for rows that do not
    /// store it separately.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::AvailableWithoutProvider`] when an
    /// available row lacks provider columns, or an agent id error when the
    /// stored provider id is invalid.
    pub fn from_columns(
        status: ResolutionStatus,
        columns: StoredProviderColumns,
        fallback_capability: &str,
        consumer_function_name: &str,
        index: usize,
    ) -> Result<Self, RegistryDomainError> {
        match status {
            ResolutionStatus::Unavailable => Ok(Self::Unavailable),
            ResolutionStatus::Unresolved => Ok(Self::Unresolved),
            ResolutionStatus::Available => {
                let StoredProviderColumns {
                    agent_id: Some(agent_id),
                    function_name: Some(function_name),
                    capability,
                    endpoint: Some(endpoint),
                } = columns
                else {
                    return Err(RegistryDomainError::AvailableWithoutProvider {
                        function_name: consumer_function_name.to_owned(),
                        index,
                    });
                };
                Ok(Self::Available(ResolvedProvider {
                    agent_id: AgentId::new(agent_id)?,
                    function_name,
                    capability: capability.unwrap_or_else(|| fallback_capability.to_owned()),
                    endpoint,
                }))
            }
        }
    }

    /// Drops the provider binding, leaving an unavailable outcome.
    #[must_use]
    pub fn detached(&self) -> Self {
        match self {
            Self::Available(_) | Self::Unavailable => Self::Unavailable,
            Self::Unresolved => Self::Unresolved,
        }
    }
}

/// Binding of one positional dependency of a consumer function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyResolution {
    /// Row identifier.
    pub id: ResolutionId,
    /// Consumer agent.
    pub consumer_agent_id: AgentId,
    /// Consumer function.
    pub consumer_function_name: String,
    /// Position in the consumer's dependency list.
    pub dep_index: u32,
    /// Requirement that was matched (first alternative when unresolved).
    pub spec: DependencySpec,
    /// Namespace the requirement was matched in.
    pub namespace: Namespace,
    /// Match outcome.
    pub outcome: ResolutionOutcome,
    /// When the outcome was last bound.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DependencyResolution {
    /// Returns the key `(consumer function, position)` within one consumer.
    #[must_use]
    pub fn key(&self) -> (&str, u32) {
        (&self.consumer_function_name, self.dep_index)
    }
}

/// Tool discovered for an LLM filter entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmToolResolution {
    /// Row identifier.
    pub id: ResolutionId,
    /// Consumer agent.
    pub consumer_agent_id: AgentId,
    /// Consumer function declaring the filter.
    pub consumer_function_name: String,
    /// Capability of the filter entry, if any.
    pub filter_capability: Option<String>,
    /// Flattened tags of the filter entry.
    pub filter_tags: Vec<String>,
    /// Filter mode.
    pub filter_mode: FilterMode,
    /// Discovered tool or miss.
    pub outcome: ResolutionOutcome,
    /// When the row was written.
    pub resolved_at: DateTime<Utc>,
}

/// Provider bound to an LLM provider selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmProviderResolution {
    /// Row identifier.
    pub id: ResolutionId,
    /// Consumer agent.
    pub consumer_agent_id: AgentId,
    /// Consumer function declaring the selector.
    pub consumer_function_name: String,
    /// Selector that was matched.
    pub spec: DependencySpec,
    /// Namespace the selector was matched in.
    pub namespace: Namespace,
    /// Match outcome.
    pub outcome: ResolutionOutcome,
    /// When the outcome was last bound.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Every resolution row of one consumer agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSet {
    /// Dependency rows ordered by function then position.
    pub dependencies: Vec<DependencyResolution>,
    /// LLM tool rows.
    pub llm_tools: Vec<LlmToolResolution>,
    /// LLM provider rows.
    pub llm_providers: Vec<LlmProviderResolution>,
}

impl ResolutionSet {
    /// Returns `(total, resolved)` dependency counts.
    #[must_use]
    pub fn dependency_counts(&self) -> (u32, u32) {
        let total = u32::try_from(self.dependencies.len()).unwrap_or(u32::MAX);
        let resolved = u32::try_from(
            self.dependencies
                .iter()
                .filter(|row| row.outcome.is_available())
                .count(),
        )
        .unwrap_or(u32::MAX);
        (total, resolved)
    }
}
