//! Semantic-version constraints used by dependency and LLM matching.
//!
//! Constraint strings follow the syntax agents send over the wire:
//! comparison operators (`>=1.0.0`), comma- or space-separated conjunctions
//! (`>=1.0, <2.0`), `||` disjunctions, tilde and caret shorthands
//! (`~1.2` expands to `>=1.2.0, <1.3.0`), and bare versions meaning exact
//! equality. Strings that do not parse are kept as [`VersionConstraint`]s in
//! the malformed state, which only accept a byte-identical version string.

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A parsed dependency version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    requirement: Requirement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Any,
    AnyOf(Vec<VersionReq>),
    Malformed,
}

impl VersionConstraint {
    /// Parses a constraint string. Empty input accepts any version.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::any();
        }

        let parsed: Option<Vec<VersionReq>> = trimmed
            .split("||")
            .map(|alternative| {
                normalize_alternative(alternative)
                    .and_then(|normalized| VersionReq::parse(&normalized).ok())
            })
            .collect();

        let requirement = parsed.map_or(Requirement::Malformed, Requirement::AnyOf);
        Self {
            raw: trimmed.to_owned(),
            requirement,
        }
    }

    /// Returns a constraint that accepts every version.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            raw: String::new(),
            requirement: Requirement::Any,
        }
    }

    /// Returns the constraint as originally supplied (trimmed).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns whether the constraint accepts every version.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self.requirement, Requirement::Any)
    }

    /// Returns whether the constraint string failed to parse.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self.requirement, Requirement::Malformed)
    }

    /// Returns whether `version` satisfies this constraint.
    ///
    /// Versions that are not valid semver only match a constraint with the
    /// identical text. Malformed constraints never match anything else.
    #[must_use]
    pub fn matches(&self, version: &str) -> bool {
        let candidate = version.trim();
        match &self.requirement {
            Requirement::Any => true,
            Requirement::Malformed => candidate == self.raw,
            Requirement::AnyOf(requirements) => {
                if candidate.is_empty() {
                    return false;
                }
                parse_version(candidate).map_or_else(
                    || candidate == self.raw,
                    |parsed| requirements.iter().any(|req| req.matches(&parsed)),
                )
            }
        }
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Parses a provider version leniently.
///
/// Accepts a leading `v` and pads missing minor/patch components, so `v1.2`
/// parses as `1.2.0`.
#[must_use]
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if let Ok(version) = Version::parse(unprefixed) {
        return Some(version);
    }

    let (core, suffix) = unprefixed
        .find(['-', '+'])
        .map_or((unprefixed, ""), |position| unprefixed.split_at(position));
    let padding = match core.matches('.').count() {
        0 => ".0.0",
        1 => ".0",
        _ => return None,
    };
    Version::parse(&format!("{core}{padding}{suffix}")).ok()
}

const fn is_operator_char(character: char) -> bool {
    matches!(character, '=' | '<' | '>' | '~' | '^')
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn normalize_alternative(alternative: &str) -> Option<String> {
    let mut comparators = Vec::new();
    let mut pending_operator: Option<&str> = None;

    let tokens = alternative
        .split(|character: char| character == ',' || character.is_whitespace())
        .filter(|token| !token.is_empty());
    for token in tokens {
        if token.chars().all(is_operator_char) {
            if pending_operator.is_some() {
                return None;
            }
            pending_operator = Some(token);
            continue;
        }

        let comparator = pending_operator
            .take()
            .map_or_else(|| token.to_owned(), |operator| format!("{operator}{token}"));
        comparators.push(normalize_comparator(&comparator));
    }

    if pending_operator.is_some() || comparators.is_empty() {
        return None;
    }
    Some(comparators.join(", "))
}

fn normalize_comparator(comparator: &str) -> String {
    let boundary = comparator
        .find(|character: char| !is_operator_char(character))
        .unwrap_or(comparator.len());
    let (operator, raw_version) = comparator.split_at(boundary);
    let version = raw_version.strip_prefix('v').unwrap_or(raw_version);

    // A bare version means exact equality, unlike Cargo's implicit caret.
    let effective_operator = if operator.is_empty() && !is_wildcard(version) {
        "="
    } else {
        operator
    };
    format!("{effective_operator}{version}")
}
