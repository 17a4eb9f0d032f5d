//! Request and response bodies of the registry HTTP API.
//!
//! Field names are snake_case; camelCase aliases are accepted on input.

use super::ApiError;
use crate::registry::{
    domain::{
        AgentStatus, AgentType, Capability, DependencySlot, DependencySpec, FilterEntry,
        FilterMode, LlmToolFilter, Namespace, ResolutionStatus, Runtime, TagRequirements,
        ToolDeclaration, VersionConstraint,
    },
    services::{
        AgentMetadata, AgentQuery, AgentRegistration, AgentView, HeartbeatRequest,
        LlmProviderInfo, LlmToolInfo, RegistrationOutcome, ResolvedDependency,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Service name reported by `/` and `/health`.
pub const SERVICE_NAME: &str = "mcp-mesh-registry";

/// Registry version reported by `/` and `/health`.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

const SUCCESS: &str = "success";

fn non_blank(value: &impl AsRef<str>) -> bool {
    !value.as_ref().trim().is_empty()
}

/// Body of `POST /agents/register`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterAgentBody {
    /// Agent identifier.
    #[serde(alias = "agentId")]
    pub agent_id: Option<String>,
    /// Agent metadata and tools.
    pub metadata: Option<AgentMetadataBody>,
}

impl RegisterAgentBody {
    /// Converts the body into a registration request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] when `agent_id` or `metadata` is
    /// missing or a field cannot be interpreted.
    pub fn into_registration(self) -> Result<AgentRegistration, ApiError> {
        let agent_id = self
            .agent_id
            .ok_or_else(|| ApiError::bad_request("agent_id is required"))?;
        let metadata = self
            .metadata
            .ok_or_else(|| ApiError::bad_request("metadata is required"))?;
        Ok(AgentRegistration::new(agent_id, metadata.into_metadata()?))
    }
}

/// Body of `POST /heartbeat`.
///
/// Registration fields may be nested under `metadata` or sent inline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeartbeatBody {
    /// Agent identifier.
    #[serde(alias = "agentId")]
    pub agent_id: Option<String>,
    /// Nested registration metadata.
    pub metadata: Option<AgentMetadataBody>,
    /// Inline registration metadata.
    #[serde(flatten)]
    pub inline: AgentMetadataBody,
}

impl HeartbeatBody {
    /// Converts the body into a heartbeat request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] when `agent_id` is missing or a
    /// metadata field cannot be interpreted.
    pub fn into_request(self) -> Result<HeartbeatRequest, ApiError> {
        let Self {
            agent_id,
            metadata,
            inline,
        } = self;
        let raw_agent_id = agent_id.ok_or_else(|| ApiError::bad_request("agent_id is required"))?;
        let request = HeartbeatRequest::new(raw_agent_id);
        let Some(declared) = metadata.or_else(|| inline.is_declared().then_some(inline)) else {
            return Ok(request);
        };
        Ok(request.with_metadata(declared.into_metadata()?))
    }
}

/// Agent metadata as sent by SDKs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentMetadataBody {
    /// Display name.
    pub name: Option<String>,
    /// Agent type.
    #[serde(alias = "agentType")]
    pub agent_type: Option<String>,
    /// Namespace.
    pub namespace: Option<String>,
    /// Agent version.
    pub version: Option<String>,
    /// SDK runtime.
    pub runtime: Option<String>,
    /// HTTP host.
    #[serde(alias = "httpHost")]
    pub http_host: Option<String>,
    /// HTTP port; `0` for stdio agents.
    #[serde(alias = "httpPort")]
    pub http_port: Option<u16>,
    /// Full endpoint, used when host and port are absent.
    pub endpoint: Option<String>,
    /// Tool declarations.
    #[serde(alias = "capabilities")]
    pub tools: Vec<ToolBody>,
}

impl AgentMetadataBody {
    fn is_declared(&self) -> bool {
        self.name.is_some()
            || self.agent_type.is_some()
            || self.namespace.is_some()
            || self.version.is_some()
            || self.runtime.is_some()
            || self.http_host.is_some()
            || self.http_port.is_some()
            || self.endpoint.is_some()
            || !self.tools.is_empty()
    }

    /// Converts the body into service metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for unknown agent types, runtimes or
    /// filter modes and a domain error for invalid namespaces.
    pub fn into_metadata(self) -> Result<AgentMetadata, ApiError> {
        let Self {
            name,
            agent_type,
            namespace,
            version,
            runtime,
            http_host,
            http_port,
            endpoint,
            tools,
        } = self;

        let mut metadata = AgentMetadata::new();
        if let Some(value) = name {
            metadata = metadata.with_name(value);
        }
        if let Some(raw) = agent_type.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let parsed = AgentType::try_from(raw).map_err(|err| ApiError::bad_request(err.to_string()))?;
            metadata = metadata.with_agent_type(parsed);
        }
        if let Some(value) = namespace.filter(non_blank) {
            metadata = metadata.with_namespace(value);
        }
        if let Some(value) = version {
            metadata = metadata.with_version(value);
        }
        if let Some(raw) = runtime.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let parsed = Runtime::try_from(raw).map_err(|err| ApiError::bad_request(err.to_string()))?;
            metadata = metadata.with_runtime(parsed);
        }

        let (host, port) = match (http_host, http_port) {
            (None, None) => endpoint
                .as_deref()
                .and_then(split_endpoint)
                .unwrap_or_default(),
            (maybe_host, maybe_port) => (maybe_host.unwrap_or_default(), maybe_port.unwrap_or_default()),
        };
        metadata = metadata.with_http(host, port);

        let declarations = tools
            .into_iter()
            .map(ToolBody::into_declaration)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metadata.with_tools(declarations))
    }
}

/// Splits `http://host:port/...` into host and port.
fn split_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let without_scheme = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .unwrap_or(endpoint);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let (host, port) = authority.rsplit_once(':')?;
    Some((host.to_owned(), port.parse().ok()?))
}

/// One tool declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolBody {
    /// Function name, unique per agent.
    #[serde(alias = "functionName")]
    pub function_name: String,
    /// Capability name; defaults to the function name.
    pub capability: Option<String>,
    /// Capability version.
    pub version: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// JSON schema of the tool input.
    #[serde(alias = "inputSchema")]
    pub input_schema: Option<Value>,
    /// LLM tool filter.
    #[serde(alias = "llmFilter")]
    pub llm_filter: Option<LlmFilterBody>,
    /// LLM provider selector.
    #[serde(alias = "llmProvider")]
    pub llm_provider: Option<DependencyBody>,
    /// Tags advertised by the tool.
    pub tags: Vec<String>,
    /// Opaque SDK keyword arguments.
    pub kwargs: Option<Value>,
    /// Positional dependencies.
    pub dependencies: Vec<DependencyEntry>,
}

impl ToolBody {
    fn into_declaration(self) -> Result<ToolDeclaration, ApiError> {
        let Self {
            function_name,
            capability,
            version,
            description,
            input_schema,
            llm_filter,
            llm_provider,
            tags,
            kwargs,
            dependencies,
        } = self;

        Ok(ToolDeclaration {
            function_name,
            capability,
            version,
            description,
            input_schema: input_schema.filter(|schema| !schema.is_null()),
            llm_filter: llm_filter.map(LlmFilterBody::into_filter).transpose()?,
            llm_provider: llm_provider.map(DependencyBody::into_spec).transpose()?,
            tags,
            kwargs: kwargs.filter(|value| !value.is_null()),
            dependencies: dependencies
                .into_iter()
                .map(DependencyEntry::into_slot)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// A dependency requirement object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DependencyBody {
    /// Capability name.
    pub capability: String,
    /// Tag requirements.
    pub tags: TagRequirements,
    /// Version constraint.
    pub version: Option<String>,
    /// Namespace override.
    pub namespace: Option<String>,
}

impl DependencyBody {
    fn into_spec(self) -> Result<DependencySpec, ApiError> {
        let Self {
            capability,
            tags,
            version,
            namespace,
        } = self;
        let mut spec = DependencySpec::new(capability).with_tags(tags);
        if let Some(raw) = version.as_deref().filter(|raw| !raw.trim().is_empty()) {
            spec = spec.with_version(VersionConstraint::parse(raw));
        }
        if let Some(raw) = namespace.filter(non_blank) {
            spec = spec.with_namespace(Namespace::new(raw)?);
        }
        Ok(spec)
    }
}

/// One positional dependency: a capability name, a requirement object or a
/// list of OR alternatives.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    /// Bare capability name.
    Name(String),
    /// Ordered alternatives.
    Alternatives(Vec<DependencyAlternative>),
    /// Requirement object.
    Spec(DependencyBody),
}

impl DependencyEntry {
    fn into_slot(self) -> Result<DependencySlot, ApiError> {
        match self {
            Self::Name(capability) => Ok(DependencySlot::Single(DependencySpec::new(capability))),
            Self::Spec(body) => Ok(DependencySlot::Single(body.into_spec()?)),
            Self::Alternatives(alternatives) => Ok(DependencySlot::Alternatives(
                alternatives
                    .into_iter()
                    .map(DependencyAlternative::into_spec)
                    .collect::<Result<_, _>>()?,
            )),
        }
    }
}

/// One alternative inside an OR dependency list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencyAlternative {
    /// Bare capability name.
    Name(String),
    /// Requirement object.
    Spec(DependencyBody),
}

impl DependencyAlternative {
    fn into_spec(self) -> Result<DependencySpec, ApiError> {
        match self {
            Self::Name(capability) => Ok(DependencySpec::new(capability)),
            Self::Spec(body) => body.into_spec(),
        }
    }
}

/// LLM tool filter: `{filter, filter_mode}`, a list of entries or a single
/// entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LlmFilterBody {
    /// Entries with the default mode.
    List(Vec<FilterEntryBody>),
    /// Entries with an explicit mode.
    Structured {
        /// Filter entries.
        filter: FilterEntries,
        /// Reduction mode; defaults to `all`.
        #[serde(default, alias = "filterMode")]
        filter_mode: Option<String>,
    },
    /// One entry with the default mode.
    Single(FilterEntryBody),
}

impl LlmFilterBody {
    fn into_filter(self) -> Result<LlmToolFilter, ApiError> {
        let (entries, raw_mode) = match self {
            Self::List(entries) => (entries, None),
            Self::Structured {
                filter,
                filter_mode,
            } => (filter.into_vec(), filter_mode),
            Self::Single(entry) => (vec![entry], None),
        };
        let filter_mode = raw_mode
            .as_deref()
            .map(FilterMode::try_from)
            .transpose()
            .map_err(|err| ApiError::bad_request(err.to_string()))?
            .unwrap_or_default();
        let filter_entries = entries.into_iter().map(FilterEntryBody::into_entry).collect();
        Ok(LlmToolFilter::new(filter_entries, filter_mode))
    }
}

/// One filter entry or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FilterEntries {
    /// Several entries.
    Many(Vec<FilterEntryBody>),
    /// A single entry.
    One(FilterEntryBody),
}

impl FilterEntries {
    fn into_vec(self) -> Vec<FilterEntryBody> {
        match self {
            Self::Many(entries) => entries,
            Self::One(entry) => vec![entry],
        }
    }
}

/// A filter entry: a capability name or `{capability?, tags?, version?}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FilterEntryBody {
    /// Capability name; `"*"` selects every tool.
    Name(String),
    /// Structured entry.
    Spec {
        /// Capability name.
        #[serde(default)]
        capability: Option<String>,
        /// Tag requirements.
        #[serde(default)]
        tags: TagRequirements,
        /// Version constraint.
        #[serde(default)]
        version: Option<String>,
    },
}

impl FilterEntryBody {
    fn into_entry(self) -> FilterEntry {
        match self {
            Self::Name(capability) => FilterEntry::capability(capability),
            Self::Spec {
                capability,
                tags,
                version,
            } => FilterEntry {
                capability: capability.filter(non_blank),
                tags,
                version: version
                    .as_deref()
                    .filter(|raw| !raw.trim().is_empty())
                    .map_or_else(VersionConstraint::any, VersionConstraint::parse),
            },
        }
    }
}

/// Query string of `GET /agents`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentListParams {
    /// Namespace filter.
    pub namespace: Option<String>,
    /// Agent type filter.
    pub agent_type: Option<String>,
    /// Comma-separated capability names.
    pub capabilities: Option<String>,
    /// Case-insensitive substring matching of capability names.
    pub fuzzy_match: Option<bool>,
}

impl AgentListParams {
    /// Converts the parameters into a listing query.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for an unknown agent type.
    pub fn into_query(self) -> Result<AgentQuery, ApiError> {
        let mut query = AgentQuery::new().with_fuzzy_match(self.fuzzy_match.unwrap_or(false));
        if let Some(namespace) = self.namespace.filter(non_blank) {
            query = query.with_namespace(namespace);
        }
        if let Some(raw) = self.agent_type.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let parsed = AgentType::try_from(raw).map_err(|err| ApiError::bad_request(err.to_string()))?;
            query = query.with_agent_type(parsed);
        }
        if let Some(raw) = self.capabilities.as_deref() {
            query = query.with_capabilities(raw.split(',').map(str::trim));
        }
        Ok(query)
    }
}

/// Response of registrations and heartbeats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Agent identifier.
    pub agent_id: String,
    /// Response time.
    pub timestamp: DateTime<Utc>,
    /// Human-readable summary.
    pub message: String,
    /// Declared dependency positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_dependencies: Option<u32>,
    /// Dependency positions bound to a provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_count: Option<u32>,
    /// Bound dependencies per function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies_resolved: Option<BTreeMap<String, Vec<ResolvedDependency>>>,
    /// Discovered tools per LLM-filtered function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_tools: Option<BTreeMap<String, Vec<LlmToolInfo>>>,
    /// Chosen provider per provider-selecting function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_providers: Option<BTreeMap<String, LlmProviderInfo>>,
}

impl RegistryResponse {
    /// Builds the response for a committed registration or full heartbeat.
    #[must_use]
    pub fn committed(outcome: RegistrationOutcome, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        let RegistrationOutcome { agent, report, .. } = outcome;
        Self {
            status: SUCCESS,
            agent_id: agent.id().as_str().to_owned(),
            timestamp: now,
            message: message.into(),
            total_dependencies: Some(report.total_dependencies),
            resolved_count: Some(report.dependencies_resolved),
            dependencies_resolved: Some(report.dependencies),
            llm_tools: Some(report.llm_tools),
            llm_providers: Some(report.llm_providers),
        }
    }

    /// Builds the response for a lightweight heartbeat.
    #[must_use]
    pub fn touched(agent_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            status: SUCCESS,
            agent_id: agent_id.to_owned(),
            timestamp: now,
            message: "Heartbeat received".to_owned(),
            total_dependencies: None,
            resolved_count: None,
            dependencies_resolved: None,
            llm_tools: None,
            llm_providers: None,
        }
    }
}

/// Response of `GET /agents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentsResponse {
    /// Matching agents.
    pub agents: Vec<AgentInfo>,
    /// Number of agents returned.
    pub count: usize,
    /// Response time.
    pub timestamp: DateTime<Utc>,
}

/// One agent in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Agent type.
    pub agent_type: AgentType,
    /// SDK runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    /// Agent version.
    pub version: String,
    /// Namespace.
    pub namespace: String,
    /// Health status.
    pub status: AgentStatus,
    /// Endpoint consumers call.
    pub endpoint: String,
    /// Declared dependency positions.
    pub total_dependencies: u32,
    /// Positions bound to a provider.
    pub dependencies_resolved: u32,
    /// First registration time.
    pub created_at: DateTime<Utc>,
    /// Last heartbeat.
    pub last_seen: DateTime<Utc>,
    /// Last full registration or heartbeat.
    pub last_full_refresh: DateTime<Utc>,
    /// Tools the agent exposes.
    pub capabilities: Vec<CapabilityInfo>,
    /// Dependency rows the agent holds.
    pub dependency_resolutions: Vec<DependencyResolutionInfo>,
    /// LLM tool rows the agent holds.
    pub llm_tool_resolutions: Vec<LlmToolResolutionInfo>,
    /// LLM provider rows the agent holds.
    pub llm_provider_resolutions: Vec<LlmProviderResolutionInfo>,
}

impl From<AgentView> for AgentInfo {
    fn from(view: AgentView) -> Self {
        let AgentView {
            agent,
            capabilities,
            resolutions,
        } = view;
        let profile = agent.profile();
        Self {
            id: agent.id().as_str().to_owned(),
            name: profile.name.clone(),
            agent_type: profile.agent_type,
            runtime: profile.runtime,
            version: profile.version.clone(),
            namespace: profile.namespace.as_str().to_owned(),
            status: agent.status(),
            endpoint: agent.endpoint(),
            total_dependencies: agent.total_dependencies(),
            dependencies_resolved: agent.dependencies_resolved(),
            created_at: agent.created_at(),
            last_seen: agent.updated_at(),
            last_full_refresh: agent.last_full_refresh(),
            capabilities: capabilities.iter().map(CapabilityInfo::from).collect(),
            dependency_resolutions: resolutions
                .dependencies
                .iter()
                .map(|row| {
                    let provider = row.outcome.provider();
                    DependencyResolutionInfo {
                        function_name: row.consumer_function_name.clone(),
                        dep_index: row.dep_index,
                        capability: row.spec.capability.clone(),
                        tags: row.spec.tags.clone(),
                        version: row.spec.version.as_str().to_owned(),
                        namespace: row.namespace.as_str().to_owned(),
                        status: row.outcome.status(),
                        provider_agent_id: provider.map(|bound| bound.agent_id.as_str().to_owned()),
                        provider_function_name: provider.map(|bound| bound.function_name.clone()),
                        endpoint: provider.map(|bound| bound.endpoint.clone()),
                        resolved_at: row.resolved_at,
                    }
                })
                .collect(),
            llm_tool_resolutions: resolutions
                .llm_tools
                .iter()
                .map(|row| {
                    let provider = row.outcome.provider();
                    LlmToolResolutionInfo {
                        function_name: row.consumer_function_name.clone(),
                        filter_capability: row.filter_capability.clone(),
                        filter_tags: row.filter_tags.clone(),
                        filter_mode: row.filter_mode.as_str(),
                        status: row.outcome.status(),
                        provider_agent_id: provider.map(|bound| bound.agent_id.as_str().to_owned()),
                        provider_function_name: provider.map(|bound| bound.function_name.clone()),
                        provider_capability: provider.map(|bound| bound.capability.clone()),
                        endpoint: provider.map(|bound| bound.endpoint.clone()),
                        resolved_at: row.resolved_at,
                    }
                })
                .collect(),
            llm_provider_resolutions: resolutions
                .llm_providers
                .iter()
                .map(|row| {
                    let provider = row.outcome.provider();
                    LlmProviderResolutionInfo {
                        function_name: row.consumer_function_name.clone(),
                        capability: row.spec.capability.clone(),
                        namespace: row.namespace.as_str().to_owned(),
                        status: row.outcome.status(),
                        provider_agent_id: provider.map(|bound| bound.agent_id.as_str().to_owned()),
                        provider_function_name: provider.map(|bound| bound.function_name.clone()),
                        endpoint: provider.map(|bound| bound.endpoint.clone()),
                        resolved_at: row.resolved_at,
                    }
                })
                .collect(),
        }
    }
}

/// One tool of a listed agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityInfo {
    /// Function name.
    pub function_name: String,
    /// Capability name.
    pub name: String,
    /// Capability version.
    pub version: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// LLM tool filter in wire form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_filter: Option<LlmFilterInfo>,
    /// LLM provider selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<DependencySpec>,
    /// Positional dependencies.
    pub dependencies: Vec<DependencySlot>,
}

impl From<&Capability> for CapabilityInfo {
    fn from(capability: &Capability) -> Self {
        Self {
            function_name: capability.function_name().to_owned(),
            name: capability.capability().to_owned(),
            version: capability.version().to_owned(),
            description: capability.description().map(str::to_owned),
            tags: capability.tags().to_vec(),
            input_schema: capability.input_schema().cloned(),
            llm_filter: capability.llm_filter().map(|filter| LlmFilterInfo {
                filter: filter.entries.clone(),
                filter_mode: filter.mode.as_str(),
            }),
            llm_provider: capability.llm_provider().cloned(),
            dependencies: capability.dependencies().to_vec(),
        }
    }
}

/// LLM tool filter as returned in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmFilterInfo {
    /// Filter entries.
    pub filter: Vec<FilterEntry>,
    /// Reduction mode.
    pub filter_mode: &'static str,
}

/// A dependency row in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyResolutionInfo {
    /// Consumer function.
    pub function_name: String,
    /// Position in the dependency list.
    pub dep_index: u32,
    /// Required capability.
    pub capability: String,
    /// Required tags.
    pub tags: TagRequirements,
    /// Required version.
    pub version: String,
    /// Namespace searched.
    pub namespace: String,
    /// Resolution status.
    pub status: ResolutionStatus,
    /// Bound provider agent.
    pub provider_agent_id: Option<String>,
    /// Bound provider function.
    pub provider_function_name: Option<String>,
    /// Bound endpoint.
    pub endpoint: Option<String>,
    /// Binding time.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// An LLM tool row in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmToolResolutionInfo {
    /// Consumer function.
    pub function_name: String,
    /// Filter entry capability.
    pub filter_capability: Option<String>,
    /// Filter entry tags.
    pub filter_tags: Vec<String>,
    /// Filter mode.
    pub filter_mode: &'static str,
    /// Resolution status.
    pub status: ResolutionStatus,
    /// Discovered provider agent.
    pub provider_agent_id: Option<String>,
    /// Discovered provider function.
    pub provider_function_name: Option<String>,
    /// Discovered provider capability.
    pub provider_capability: Option<String>,
    /// Discovered endpoint.
    pub endpoint: Option<String>,
    /// Resolution time.
    pub resolved_at: DateTime<Utc>,
}

/// An LLM provider row in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmProviderResolutionInfo {
    /// Consumer function.
    pub function_name: String,
    /// Required capability.
    pub capability: String,
    /// Namespace searched.
    pub namespace: String,
    /// Resolution status.
    pub status: ResolutionStatus,
    /// Bound provider agent.
    pub provider_agent_id: Option<String>,
    /// Bound provider function.
    pub provider_function_name: Option<String>,
    /// Bound endpoint.
    pub endpoint: Option<String>,
    /// Binding time.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unhealthy`.
    pub status: &'static str,
    /// Registry version.
    pub version: &'static str,
    /// Seconds since the registry started.
    pub uptime_seconds: i64,
    /// Response time.
    pub timestamp: DateTime<Utc>,
    /// Service name.
    pub service: &'static str,
}

/// Response of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootResponse {
    /// Service name.
    pub service: &'static str,
    /// Registry version.
    pub version: &'static str,
    /// Always `running`.
    pub status: &'static str,
    /// Available endpoints.
    pub endpoints: Vec<&'static str>,
}
