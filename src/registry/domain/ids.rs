//! Identifier and validated-name types for the registry.

use super::RegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for an agent identifier, matching `VARCHAR(253)`.
const MAX_AGENT_ID_LENGTH: usize = 253;

/// Maximum length for a namespace (DNS label).
const MAX_NAMESPACE_LENGTH: usize = 63;

/// Namespace assigned when a registration omits one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Agent-chosen identifier, unique across the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a validated agent identifier.
    ///
    /// The input is trimmed. Alphanumerics, `-`, `_` and `.` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(RegistryDomainError::EmptyAgentId);
        }

        if trimmed.len() > MAX_AGENT_ID_LENGTH {
            return Err(RegistryDomainError::AgentIdTooLong(trimmed.to_owned()));
        }

        let is_valid = trimmed.chars().all(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '-' | '_' | '.')
        });
        if !is_valid {
            return Err(RegistryDomainError::InvalidAgentId(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Isolation scope used when matching providers to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a validated namespace.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::InvalidNamespace`] when the value is not
    /// a lowercase DNS label.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        let well_formed = !trimmed.is_empty()
            && trimmed.len() <= MAX_NAMESPACE_LENGTH
            && trimmed.chars().all(|character| {
                character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-'
            })
            && !trimmed.starts_with('-')
            && !trimmed.ends_with('-');
        if !well_formed {
            return Err(RegistryDomainError::InvalidNamespace(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Parses an optional namespace, falling back to [`DEFAULT_NAMESPACE`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::InvalidNamespace`] when a provided value
    /// is malformed.
    pub fn or_default(value: Option<&str>) -> Result<Self, RegistryDomainError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(namespace) => Self::new(namespace),
        }
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_owned())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Row identifier for a stored capability.
    CapabilityId
);

uuid_id!(
    /// Row identifier for a stored resolution (dependency, tool or provider).
    ResolutionId
);

uuid_id!(
    /// Row identifier for a registry event.
    EventId
);
