//! Domain model for the mesh registry.
//!
//! Agents own capabilities (tools); capabilities declare dependencies and
//! optional LLM filters or provider selectors. Resolution records bind those
//! requirements to healthy providers chosen by the [`CapabilityMatcher`].
//! Everything here is pure: storage and time come in through ports and the
//! injected clock.

mod agent;
mod capability;
mod dependency;
mod error;
mod event;
mod ids;
mod llm;
mod matcher;
mod resolution;
mod selection;
mod status;
mod tags;
mod version;

pub use agent::{
    Agent, AgentProfile, DEFAULT_AGENT_VERSION, PersistedAgentData, StatusTransition,
    build_endpoint,
};
pub use capability::{
    Capability, CapabilityChangeSet, PersistedCapabilityData, ToolDeclaration, UNKNOWN_VENDOR,
    reconcile_capabilities, validate_tools,
};
pub use dependency::{DependencySlot, DependencySpec};
pub use error::{
    ParseAgentStatusError, ParseAgentTypeError, ParseEventTypeError, ParseFilterModeError,
    ParseResolutionStatusError, ParseRuntimeError, ParseSelectionPolicyError,
    RegistryDomainError,
};
pub use event::{PersistedEventData, RegistryEvent, RegistryEventType};
pub use ids::{AgentId, CapabilityId, DEFAULT_NAMESPACE, EventId, Namespace, ResolutionId};
pub use llm::{FilterEntry, FilterMode, LlmToolFilter, WILDCARD_CAPABILITY};
pub use matcher::{CapabilityMatcher, MatchOutcome, ProviderCandidate, RankedCandidate};
pub use resolution::{
    DependencyResolution, LlmProviderResolution, LlmToolResolution, ResolutionOutcome,
    ResolutionSet, ResolutionStatus, ResolvedProvider, StoredProviderColumns,
};
pub use selection::SelectionPolicy;
pub use status::{AgentStatus, AgentType, Runtime};
pub use tags::{PREFERRED_TAG_SCORE, REQUIRED_TAG_SCORE, TagEntry, TagRequirements};
pub use version::{VersionConstraint, parse_version};
