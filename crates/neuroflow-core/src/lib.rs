//! Core types and error definitions for the neuroflow backend.
//!
//! This crate provides the foundational types shared across all neuroflow crates,
//! including the error taxonomy, conversation messages, request step events and
//! the realtime broadcast envelopes.
//!
//! # Main types
//!
//! - [`NeuroError`]: Unified error enum for all neuroflow subsystems.
//! - [`NeuroResult`]: Convenience alias for `Result<T, NeuroError>`.
//! - [`Role`]: Message role (user, assistant, system).
//! - [`Message`]: A single message within a conversation session.
//! - [`Intent`]: Closed set of user intent categories.
//! - [`StepEvent`]: One stage of request processing, broadcast live.
//! - [`InteractionRecord`]: The audit trail of one completed request.
//! - [`BroadcastMessage`] / [`RealtimeEvent`]: Realtime channel payloads.

/// Step events and realtime broadcast envelopes.
pub mod event;
/// User intent categories.
pub mod intent;
/// Interaction audit records and sentiment labels.
pub mod record;

pub use event::{
    BroadcastMessage, GraphLink, GraphNodeView, GraphTopology, HeatDelta, RealtimeEvent,
    StepEvent, StepStatus,
};
pub use intent::Intent;
pub use record::{InteractionRecord, SentimentLabel};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for neuroflow.
///
/// The first four variants form the runtime failure taxonomy the streaming
/// pipeline degrades on; the rest are plumbing errors.
#[derive(Debug, thiserror::Error)]
pub enum NeuroError {
    /// A collaborator (classifier, model, retriever) was unreachable or timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A directive payload failed schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A storage write or read failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The generation stream failed mid-flight.
    #[error("Stream error: {0}")]
    Stream(String),

    /// An outbound HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration could not be parsed or is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Session lookup or bookkeeping failed.
    #[error("Session error: {0}")]
    Session(String),

    /// A realtime channel operation failed.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A knowledge graph invariant was violated.
    #[error("Graph error: {0}")]
    Graph(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`NeuroError`].
pub type NeuroResult<T> = Result<T, NeuroError>;

// --- Message types ---

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system-level instruction or prompt.
    System,
}

impl Role {
    /// Wire name used by OpenAI-compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message exchanged within a conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors_set_role() {
        assert_eq!(Message::user("hola").role, Role::User);
        assert_eq!(Message::assistant("hola").role, Role::Assistant);
        assert_eq!(Message::system("hola").role, Role::System);
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn test_error_display_carries_taxonomy() {
        let err = NeuroError::Transport("classifier timed out".into());
        assert_eq!(err.to_string(), "Transport error: classifier timed out");

        let err: NeuroError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, NeuroError::Json(_)));
    }
}
