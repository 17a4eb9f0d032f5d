//! Error types for registry domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDomainError {
    /// The agent identifier is empty after trimming.
    #[error("agent_id is required")]
    EmptyAgentId,

    /// The agent identifier exceeds the 253-character limit.
    #[error("agent_id cannot exceed 253 characters: {0}")]
    AgentIdTooLong(String),

    /// The agent identifier contains unsupported characters.
    #[error(
        "agent_id '{0}' contains invalid characters (only alphanumerics, '-', '_' and '.' allowed)"
    )]
    InvalidAgentId(String),

    /// The namespace is empty or not a DNS-label style name.
    #[error(
        "namespace '{0}' must be 1-63 lowercase alphanumeric characters or hyphens, starting and ending alphanumeric"
    )]
    InvalidNamespace(String),

    /// A tool was declared without a function name.
    #[error("tool at position {0} is missing function_name")]
    MissingFunctionName(usize),

    /// Two tools of the same agent share a function name.
    #[error("duplicate function_name '{0}' in tool list")]
    DuplicateFunctionName(String),

    /// A registration carried no tools for an agent type that must expose some.
    #[error("agent '{0}' must declare at least one tool")]
    NoTools(String),

    /// A dependency entry has no capability name.
    #[error("dependency {index} of '{function_name}' is missing capability")]
    MissingDependencyCapability {
        /// Function declaring the dependency.
        function_name: String,
        /// Position of the dependency.
        index: usize,
    },

    /// A dependency counter update would break `resolved <= total`.
    #[error("dependencies_resolved ({resolved}) exceeds total_dependencies ({total})")]
    DependencyCountMismatch {
        /// Number of resolved dependencies.
        resolved: u32,
        /// Number of declared dependencies.
        total: u32,
    },

    /// An available resolution was constructed without provider details.
    #[error("resolution for '{function_name}' position {index} is available without a provider")]
    AvailableWithoutProvider {
        /// Consumer function.
        function_name: String,
        /// Dependency position.
        index: usize,
    },
}

/// Error returned while parsing agent status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent status: {0}")]
pub struct ParseAgentStatusError(pub String);

/// Error returned while parsing agent type from input or persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent type: {0}")]
pub struct ParseAgentTypeError(pub String);

/// Error returned while parsing an agent runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent runtime: {0}")]
pub struct ParseRuntimeError(pub String);

/// Error returned while parsing a resolution status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown resolution status: {0}")]
pub struct ParseResolutionStatusError(pub String);

/// Error returned while parsing a registry event type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown registry event type: {0}")]
pub struct ParseEventTypeError(pub String);

/// Error returned while parsing an LLM filter mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown filter mode: {0}")]
pub struct ParseFilterModeError(pub String);

/// Error returned while parsing a selection policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown selection policy: {0} (expected first_healthy, most_recent_heartbeat or least_loaded)")]
pub struct ParseSelectionPolicyError(pub String);
