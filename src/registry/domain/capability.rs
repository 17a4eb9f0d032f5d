//! Capabilities (tools) owned by an agent and their reconciliation.

use super::{
    CapabilityId, DependencySlot, DependencySpec, LlmToolFilter, RegistryDomainError,
    DEFAULT_AGENT_VERSION,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Vendor reported for LLM providers that do not declare one.
pub const UNKNOWN_VENDOR: &str = "unknown";

/// A tool as declared in a registration or full heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Function name, unique per agent.
    pub function_name: String,
    /// Capability name; defaults to the function name.
    pub capability: Option<String>,
    /// Capability version; defaults to `1.0.0`.
    pub version: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// JSON schema of the tool input.
    pub input_schema: Option<Value>,
    /// LLM tool-discovery filter.
    pub llm_filter: Option<LlmToolFilter>,
    /// LLM provider selector.
    pub llm_provider: Option<DependencySpec>,
    /// Tags advertised by the tool.
    pub tags: Vec<String>,
    /// Opaque SDK keyword arguments.
    pub kwargs: Option<Value>,
    /// Positional dependency list.
    pub dependencies: Vec<DependencySlot>,
}

impl ToolDeclaration {
    /// Creates a declaration with only a function name.
    #[must_use]
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            ..Self::default()
        }
    }

    /// Sets the capability name.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    /// Sets the capability version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the advertised tags.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a positional dependency.
    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<DependencySlot>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Sets the LLM tool filter.
    #[must_use]
    pub fn with_llm_filter(mut self, filter: LlmToolFilter) -> Self {
        self.llm_filter = Some(filter);
        self
    }

    /// Sets the LLM provider selector.
    #[must_use]
    pub fn with_llm_provider(mut self, provider: DependencySpec) -> Self {
        self.llm_provider = Some(provider);
        self
    }

    /// Sets SDK keyword arguments.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: Value) -> Self {
        self.kwargs = Some(kwargs);
        self
    }
}

/// Validates a declared tool list.
///
/// # Errors
///
/// Returns [`RegistryDomainError`] when a tool lacks a function name, a
/// function name repeats, or a dependency names no capability.
pub fn validate_tools(tools: &[ToolDeclaration]) -> Result<(), RegistryDomainError> {
    let mut seen = HashSet::new();
    for (position, tool) in tools.iter().enumerate() {
        let function_name = tool.function_name.trim();
        if function_name.is_empty() {
            return Err(RegistryDomainError::MissingFunctionName(position));
        }
        if !seen.insert(function_name) {
            return Err(RegistryDomainError::DuplicateFunctionName(
                function_name.to_owned(),
            ));
        }
        for (index, slot) in tool.dependencies.iter().enumerate() {
            let blank = slot.alternatives().is_empty()
                || slot
                    .alternatives()
                    .iter()
                    .any(|spec| spec.capability.trim().is_empty());
            if blank {
                return Err(RegistryDomainError::MissingDependencyCapability {
                    function_name: function_name.to_owned(),
                    index,
                });
            }
        }
    }
    Ok(())
}

/// Stored capability row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    id: CapabilityId,
    function_name: String,
    capability: String,
    version: String,
    description: Option<String>,
    input_schema: Option<Value>,
    llm_filter: Option<LlmToolFilter>,
    llm_provider: Option<DependencySpec>,
    tags: Vec<String>,
    kwargs: Option<Value>,
    dependencies: Vec<DependencySlot>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted capability.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedCapabilityData {
    /// Row identifier.
    pub id: CapabilityId,
    /// The tool as last declared.
    pub declaration: ToolDeclaration,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Capability {
    /// Creates a capability from a declaration.
    #[must_use]
    pub fn new(declaration: ToolDeclaration, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self::from_parts(CapabilityId::new(), declaration, timestamp, timestamp)
    }

    /// Reconstructs a capability from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedCapabilityData) -> Self {
        Self::from_parts(data.id, data.declaration, data.created_at, data.updated_at)
    }

    fn from_parts(
        id: CapabilityId,
        declaration: ToolDeclaration,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let function_name = declaration.function_name.trim().to_owned();
        let capability = declaration
            .capability
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| function_name.clone());
        let version = declaration
            .version
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_AGENT_VERSION.to_owned());
        Self {
            id,
            function_name,
            capability,
            version,
            description: declaration.description,
            input_schema: declaration.input_schema,
            llm_filter: declaration.llm_filter,
            llm_provider: declaration.llm_provider,
            tags: declaration.tags,
            kwargs: declaration.kwargs,
            dependencies: declaration.dependencies,
            created_at,
            updated_at,
        }
    }

    /// Returns the row identifier.
    #[must_use]
    pub const fn id(&self) -> CapabilityId {
        self.id
    }

    /// Returns the function name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Returns the capability name.
    #[must_use]
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Returns the capability version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the input schema.
    #[must_use]
    pub const fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    /// Returns the LLM tool filter.
    #[must_use]
    pub const fn llm_filter(&self) -> Option<&LlmToolFilter> {
        self.llm_filter.as_ref()
    }

    /// Returns the LLM provider selector.
    #[must_use]
    pub const fn llm_provider(&self) -> Option<&DependencySpec> {
        self.llm_provider.as_ref()
    }

    /// Returns the advertised tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the SDK keyword arguments.
    #[must_use]
    pub const fn kwargs(&self) -> Option<&Value> {
        self.kwargs.as_ref()
    }

    /// Returns the positional dependency list.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencySlot] {
        &self.dependencies
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the LLM vendor from `kwargs.vendor`.
    #[must_use]
    pub fn vendor(&self) -> &str {
        self.kwargs
            .as_ref()
            .and_then(|kwargs| kwargs.get("vendor"))
            .and_then(Value::as_str)
            .filter(|vendor| !vendor.is_empty())
            .unwrap_or(UNKNOWN_VENDOR)
    }

    /// Returns the declaration this capability was built from.
    #[must_use]
    pub fn to_declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            function_name: self.function_name.clone(),
            capability: Some(self.capability.clone()),
            version: Some(self.version.clone()),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            llm_filter: self.llm_filter.clone(),
            llm_provider: self.llm_provider.clone(),
            tags: self.tags.clone(),
            kwargs: self.kwargs.clone(),
            dependencies: self.dependencies.clone(),
        }
    }

    fn same_content(&self, other: &Self) -> bool {
        self.capability == other.capability
            && self.version == other.version
            && self.description == other.description
            && self.input_schema == other.input_schema
            && self.llm_filter == other.llm_filter
            && self.llm_provider == other.llm_provider
            && self.tags == other.tags
            && self.kwargs == other.kwargs
            && self.dependencies == other.dependencies
    }
}

/// Inserts, updates and deletes turning an agent's stored capabilities into
/// its latest declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityChangeSet {
    /// Capabilities to insert.
    pub inserted: Vec<Capability>,
    /// Existing capabilities whose content changed; identifiers are kept.
    pub updated: Vec<Capability>,
    /// Existing capabilities that are no longer declared.
    pub deleted: Vec<CapabilityId>,
    /// Full desired set in declaration order.
    pub desired: Vec<Capability>,
}

impl CapabilityChangeSet {
    /// Returns whether any row changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.inserted.is_empty() || !self.updated.is_empty() || !self.deleted.is_empty()
    }

    /// Function names of capabilities changed in place.
    ///
    /// Consumers bound to these lose their binding and re-resolve against
    /// the new content.
    pub fn updated_functions(&self) -> impl Iterator<Item = &str> {
        self.updated.iter().map(Capability::function_name)
    }
}

/// Reconciles stored capabilities against a declared tool list, keyed by
/// function name.
#[must_use]
pub fn reconcile_capabilities(
    existing: &[Capability],
    declared: Vec<ToolDeclaration>,
    clock: &impl Clock,
) -> CapabilityChangeSet {
    let timestamp = clock.utc();
    let by_name: HashMap<&str, &Capability> = existing
        .iter()
        .map(|capability| (capability.function_name(), capability))
        .collect();

    let mut change_set = CapabilityChangeSet::default();
    let mut kept = HashSet::new();
    for declaration in declared {
        let function_name = declaration.function_name.trim().to_owned();
        match by_name.get(function_name.as_str()) {
            Some(current) => {
                kept.insert(current.id());
                let candidate = Capability::from_parts(
                    current.id(),
                    declaration,
                    current.created_at(),
                    current.updated_at(),
                );
                if candidate.same_content(current) {
                    change_set.desired.push(candidate);
                } else {
                    let refreshed = Capability {
                        updated_at: timestamp,
                        ..candidate
                    };
                    change_set.updated.push(refreshed.clone());
                    change_set.desired.push(refreshed);
                }
            }
            None => {
                let inserted =
                    Capability::from_parts(CapabilityId::new(), declaration, timestamp, timestamp);
                change_set.inserted.push(inserted.clone());
                change_set.desired.push(inserted);
            }
        }
    }

    change_set.deleted = existing
        .iter()
        .map(Capability::id)
        .filter(|id| !kept.contains(id))
        .collect();
    change_set
}
