//! Diesel row models for registry persistence.

use super::schema::{
    agents, capabilities, dependency_resolutions, llm_provider_resolutions,
    llm_tool_resolutions, registry_events,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Agent record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = agents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AgentRow {
    /// Agent identifier.
    pub agent_id: String,
    /// Human-readable name.
    pub name: String,
    /// Agent build version.
    pub version: String,
    /// Dependency scoping namespace.
    pub namespace: String,
    /// Agent kind.
    pub agent_type: String,
    /// SDK runtime.
    pub runtime: Option<String>,
    /// MCP host.
    pub http_host: String,
    /// MCP port.
    pub http_port: i32,
    /// Health status.
    pub status: String,
    /// Declared dependency positions.
    pub total_dependencies: i32,
    /// Bound dependency positions.
    pub dependencies_resolved: i32,
    /// First registration time.
    pub created_at: DateTime<Utc>,
    /// Last heartbeat time.
    pub updated_at: DateTime<Utc>,
    /// Last full refresh time.
    pub last_full_refresh: DateTime<Utc>,
}

/// Capability record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = capabilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CapabilityRow {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Owning agent.
    pub agent_id: String,
    /// Tool function name.
    pub function_name: String,
    /// Capability name.
    pub capability: String,
    /// Capability version.
    pub version: String,
    /// Tool description.
    pub description: Option<String>,
    /// Tool input schema.
    pub input_schema: Option<Value>,
    /// LLM tool filter JSON.
    pub llm_filter: Option<Value>,
    /// LLM provider selector JSON.
    pub llm_provider: Option<Value>,
    /// Advertised tags JSON.
    pub tags: Value,
    /// SDK keyword arguments.
    pub kwargs: Option<Value>,
    /// Dependency list JSON.
    pub dependencies: Value,
    /// Declaration order.
    pub position: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last content change.
    pub updated_at: DateTime<Utc>,
}

/// Dependency resolution record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = dependency_resolutions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DependencyResolutionRow {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Consumer agent.
    pub consumer_agent_id: String,
    /// Consumer function.
    pub consumer_function_name: String,
    /// Dependency position.
    pub dep_index: i32,
    /// Required capability.
    pub capability_required: String,
    /// Required tags JSON.
    pub tags_required: Value,
    /// Version constraint.
    pub version_required: String,
    /// Namespace matched in.
    pub namespace_required: String,
    /// Bound provider agent.
    pub provider_agent_id: Option<String>,
    /// Bound provider function.
    pub provider_function_name: Option<String>,
    /// Bound provider capability.
    pub provider_capability: Option<String>,
    /// Provider endpoint.
    pub endpoint: Option<String>,
    /// Resolution status.
    pub status: String,
    /// Binding time.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// LLM tool resolution record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = llm_tool_resolutions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LlmToolResolutionRow {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Consumer agent.
    pub consumer_agent_id: String,
    /// Consumer function.
    pub consumer_function_name: String,
    /// Filter entry capability.
    pub filter_capability: Option<String>,
    /// Filter entry tags JSON.
    pub filter_tags: Value,
    /// Filter mode.
    pub filter_mode: String,
    /// Discovered provider agent.
    pub provider_agent_id: Option<String>,
    /// Discovered provider function.
    pub provider_function_name: Option<String>,
    /// Discovered provider capability.
    pub provider_capability: Option<String>,
    /// Provider endpoint.
    pub endpoint: Option<String>,
    /// Resolution status.
    pub status: String,
    /// Order within the consumer.
    pub position: i32,
    /// Write time.
    pub resolved_at: DateTime<Utc>,
}

/// LLM provider resolution record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = llm_provider_resolutions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LlmProviderResolutionRow {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Consumer agent.
    pub consumer_agent_id: String,
    /// Consumer function.
    pub consumer_function_name: String,
    /// Required capability.
    pub required_capability: String,
    /// Required tags JSON.
    pub required_tags: Value,
    /// Version constraint.
    pub required_version: String,
    /// Namespace matched in.
    pub required_namespace: String,
    /// Bound provider agent.
    pub provider_agent_id: Option<String>,
    /// Bound provider function.
    pub provider_function_name: Option<String>,
    /// Bound provider capability.
    pub provider_capability: Option<String>,
    /// Provider endpoint.
    pub endpoint: Option<String>,
    /// Resolution status.
    pub status: String,
    /// Binding time.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Registry event record.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = registry_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventRow {
    /// Event identifier.
    pub id: uuid::Uuid,
    /// Agent the event concerns.
    pub agent_id: String,
    /// Event type.
    pub event_type: String,
    /// Function the event concerns.
    pub function_name: Option<String>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub data: Value,
}
