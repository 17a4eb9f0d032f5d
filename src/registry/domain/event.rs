//! Append-only registry event log entries.

use super::{AgentId, EventId, ParseEventTypeError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of registry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryEventType {
    /// Agent registered or recovered.
    Register,
    /// Full heartbeat without capability changes.
    Heartbeat,
    /// Agent timed out.
    Expire,
    /// Full heartbeat that changed the capability set.
    Update,
    /// Agent shut down gracefully.
    Unregister,
}

impl RegistryEventType {
    /// Event types that change the mesh topology seen by consumers.
    pub const TOPOLOGY_CHANGES: [Self; 4] =
        [Self::Register, Self::Unregister, Self::Expire, Self::Update];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Heartbeat => "heartbeat",
            Self::Expire => "expire",
            Self::Update => "update",
            Self::Unregister => "unregister",
        }
    }

    /// Returns whether consumers must refresh after this event.
    #[must_use]
    pub const fn is_topology_change(self) -> bool {
        !matches!(self, Self::Heartbeat)
    }
}

impl fmt::Display for RegistryEventType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RegistryEventType {
    type Error = ParseEventTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "register" => Ok(Self::Register),
            "heartbeat" => Ok(Self::Heartbeat),
            "expire" => Ok(Self::Expire),
            "update" => Ok(Self::Update),
            "unregister" => Ok(Self::Unregister),
            _ => Err(ParseEventTypeError(value.to_owned())),
        }
    }
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEvent {
    id: EventId,
    agent_id: AgentId,
    event_type: RegistryEventType,
    function_name: Option<String>,
    timestamp: DateTime<Utc>,
    data: Value,
}

/// Parameter object for reconstructing a persisted event.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedEventData {
    /// Event identifier.
    pub id: EventId,
    /// Agent the event concerns.
    pub agent_id: AgentId,
    /// Event type.
    pub event_type: RegistryEventType,
    /// Function the event concerns, if any.
    pub function_name: Option<String>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub data: Value,
}

impl RegistryEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        event_type: RegistryEventType,
        data: Value,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: EventId::new(),
            agent_id,
            event_type,
            function_name: None,
            timestamp: clock.utc(),
            data,
        }
    }

    /// Reconstructs an event from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedEventData) -> Self {
        Self {
            id: data.id,
            agent_id: data.agent_id,
            event_type: data.event_type,
            function_name: data.function_name,
            timestamp: data.timestamp,
            data: data.data,
        }
    }

    /// Attaches a function name.
    #[must_use]
    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }

    /// Returns the event identifier.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Returns the agent the event concerns.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the event type.
    #[must_use]
    pub const fn event_type(&self) -> RegistryEventType {
        self.event_type
    }

    /// Returns the function name, if any.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    /// Returns the event time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the payload.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }
}
