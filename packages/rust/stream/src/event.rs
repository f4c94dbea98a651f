//! Event envelope sent to streaming clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_KEEPALIVE: &str = "keepalive";
pub const EVENT_SERVER_SHUTDOWN: &str = "server_shutdown";

/// Stable identifier of one streaming connection (`client_{unix}_{seq}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub(crate) fn generate(seq: u64) -> Self {
        Self(format!("client_{}_{seq}", Utc::now().timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which triggered operation a phase event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Scrape,
    Document,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Document => "document",
        }
    }
}

/// Position of an event in an operation's `start -> result|error -> complete` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Result,
    Error,
    Complete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Result => "result",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

/// One server-sent event. Serialized whole as the SSE `data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub event: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        let event = event.into();
        Self {
            id: format!("{event}_{}", uuid::Uuid::now_v7()),
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn connected(client_id: &ClientId) -> Self {
        Self::new(
            EVENT_CONNECTED,
            json!({"clientID": client_id, "message": "Connected to contentmcp event stream"}),
        )
    }

    pub fn keepalive() -> Self {
        Self::new(EVENT_KEEPALIVE, json!({"timestamp": Utc::now()}))
    }

    pub fn server_shutdown() -> Self {
        Self::new(EVENT_SERVER_SHUTDOWN, json!({"message": "server is shutting down"}))
    }

    /// `{kind}_{phase}` event, e.g. `document_result`.
    pub fn phase(kind: OperationKind, phase: Phase, data: Value) -> Self {
        Self::new(format!("{}_{}", kind.as_str(), phase.as_str()), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_event_names() {
        let event = StreamEvent::phase(OperationKind::Document, Phase::Result, json!({}));
        assert_eq!(event.event, "document_result");
        assert!(event.id.starts_with("document_result_"));

        let event = StreamEvent::phase(OperationKind::Scrape, Phase::Complete, json!({}));
        assert_eq!(event.event, "scrape_complete");
    }

    #[test]
    fn ids_are_unique() {
        let a = StreamEvent::keepalive();
        let b = StreamEvent::keepalive();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn connected_carries_client_id() {
        let id = ClientId::generate(7);
        assert!(id.as_str().starts_with("client_"));
        assert!(id.as_str().ends_with("_7"));

        let event = StreamEvent::connected(&id);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "connected");
        assert_eq!(json["data"]["clientID"], id.as_str());
        assert!(json["timestamp"].is_string());
    }
}
