//! Declared dependencies of a tool.

use super::{Namespace, TagRequirements, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::slice;

/// A single capability requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Capability name the provider must expose.
    pub capability: String,
    /// Tag requirements for the provider.
    #[serde(default)]
    pub tags: TagRequirements,
    /// Version constraint for the provider capability.
    #[serde(default)]
    pub version: VersionConstraint,
    /// Namespace override; the consumer's namespace applies when absent.
    #[serde(default)]
    pub namespace: Option<Namespace>,
}

impl DependencySpec {
    /// Creates a spec for `capability` with no further constraints.
    #[must_use]
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            tags: TagRequirements::default(),
            version: VersionConstraint::any(),
            namespace: None,
        }
    }

    /// Sets tag requirements.
    #[must_use]
    pub fn with_tags(mut self, tags: TagRequirements) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the version constraint.
    #[must_use]
    pub fn with_version(mut self, version: VersionConstraint) -> Self {
        self.version = version;
        self
    }

    /// Sets an explicit namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Returns the namespace providers must live in.
    #[must_use]
    pub fn effective_namespace<'a>(&'a self, consumer: &'a Namespace) -> &'a Namespace {
        self.namespace.as_ref().unwrap_or(consumer)
    }
}

/// One positional dependency entry.
///
/// A list of alternatives resolves to the first alternative that matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySlot {
    /// A single requirement.
    Single(DependencySpec),
    /// Ordered OR alternatives.
    Alternatives(Vec<DependencySpec>),
}

impl DependencySlot {
    /// Returns the alternatives in declaration order.
    #[must_use]
    pub fn alternatives(&self) -> &[DependencySpec] {
        match self {
            Self::Single(spec) => slice::from_ref(spec),
            Self::Alternatives(specs) => specs,
        }
    }

    /// Returns the spec recorded when no alternative resolves.
    #[must_use]
    pub fn primary(&self) -> Option<&DependencySpec> {
        self.alternatives().first()
    }
}

impl From<DependencySpec> for DependencySlot {
    fn from(spec: DependencySpec) -> Self {
        Self::Single(spec)
    }
}
