//! LLM tool-discovery filters.

use super::{ParseFilterModeError, TagRequirements, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability name that matches every tool.
pub const WILDCARD_CAPABILITY: &str = "*";

/// How matches of an LLM tool filter are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Every matching tool.
    #[default]
    #[serde(rename = "all")]
    All,
    /// The best tool per capability.
    #[serde(rename = "best_match")]
    BestMatch,
    /// Every tool in the mesh except the consumer's own.
    #[serde(rename = "*")]
    Wildcard,
}

impl FilterMode {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::BestMatch => "best_match",
            Self::Wildcard => "*",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FilterMode {
    type Error = ParseFilterModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "all" => Ok(Self::All),
            "best_match" => Ok(Self::BestMatch),
            "*" => Ok(Self::Wildcard),
            _ => Err(ParseFilterModeError(value.to_owned())),
        }
    }
}

/// One filter entry: a capability name and/or tag and version constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Capability to match; `None` matches any capability.
    #[serde(default)]
    pub capability: Option<String>,
    /// Tag requirements.
    #[serde(default)]
    pub tags: TagRequirements,
    /// Version constraint.
    #[serde(default)]
    pub version: VersionConstraint,
}

impl FilterEntry {
    /// Creates an entry matching a capability by name.
    #[must_use]
    pub fn capability(name: impl Into<String>) -> Self {
        Self {
            capability: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns whether the entry is the bare `"*"` wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.capability.as_deref() == Some(WILDCARD_CAPABILITY)
            && self.tags.is_empty()
            && self.version.is_any()
    }

    /// Returns whether a tool with the given properties passes this entry and
    /// its tag score.
    #[must_use]
    pub fn score(&self, capability: &str, version: &str, tags: &[String]) -> Option<u32> {
        let capability_matches = self
            .capability
            .as_deref()
            .is_none_or(|wanted| wanted == WILDCARD_CAPABILITY || wanted == capability);
        if !capability_matches || !self.version.matches(version) {
            return None;
        }
        self.tags.score(tags)
    }
}

/// Tool filter declared by an LLM-driven tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmToolFilter {
    /// Entries combined with OR semantics.
    pub entries: Vec<FilterEntry>,
    /// Reduction mode.
    #[serde(default)]
    pub mode: FilterMode,
}

impl LlmToolFilter {
    /// Creates a filter from entries and a mode.
    #[must_use]
    pub const fn new(entries: Vec<FilterEntry>, mode: FilterMode) -> Self {
        Self { entries, mode }
    }

    /// Returns whether the filter selects every tool in the mesh.
    #[must_use]
    pub fn selects_everything(&self) -> bool {
        self.mode == FilterMode::Wildcard || self.entries.iter().any(FilterEntry::is_wildcard)
    }
}
