//! Agent health status, agent type and runtime enumerations.

use super::{ParseAgentStatusError, ParseAgentTypeError, ParseRuntimeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not yet confirmed by a registration or heartbeat.
    Unknown,
    /// Heartbeating within the timeout threshold.
    Healthy,
    /// Missed heartbeats or unregistered.
    Unhealthy,
}

impl AgentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentStatus {
    type Error = ParseAgentStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unknown" => Ok(Self::Unknown),
            "healthy" => Ok(Self::Healthy),
            "unhealthy" => Ok(Self::Unhealthy),
            _ => Err(ParseAgentStatusError(value.to_owned())),
        }
    }
}

/// Kind of process registered with the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// A full MCP agent exposing tools.
    #[default]
    McpAgent,
    /// A standalone mesh tool.
    MeshTool,
    /// An agent built from SDK decorators.
    DecoratorAgent,
    /// A pure consumer (for example an HTTP API) that exposes no tools.
    Api,
}

impl AgentType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::McpAgent => "mcp_agent",
            Self::MeshTool => "mesh_tool",
            Self::DecoratorAgent => "decorator_agent",
            Self::Api => "api",
        }
    }

    /// Returns whether agents of this type must declare tools.
    #[must_use]
    pub const fn requires_tools(self) -> bool {
        !matches!(self, Self::Api)
    }

    /// Returns whether status transitions are recorded as events.
    #[must_use]
    pub const fn emits_status_events(self) -> bool {
        !matches!(self, Self::Api)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentType {
    type Error = ParseAgentTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "mcp_agent" => Ok(Self::McpAgent),
            "mesh_tool" => Ok(Self::MeshTool),
            "decorator_agent" => Ok(Self::DecoratorAgent),
            "api" => Ok(Self::Api),
            _ => Err(ParseAgentTypeError(value.to_owned())),
        }
    }
}

/// Language runtime hosting an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    /// Python SDK.
    Python,
    /// TypeScript SDK.
    Typescript,
    /// Java SDK.
    Java,
}

impl Runtime {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Typescript => "typescript",
            Self::Java => "java",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Runtime {
    type Error = ParseRuntimeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "python" => Ok(Self::Python),
            "typescript" => Ok(Self::Typescript),
            "java" => Ok(Self::Java),
            _ => Err(ParseRuntimeError(value.to_owned())),
        }
    }
}
