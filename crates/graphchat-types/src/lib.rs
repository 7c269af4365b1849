//! Core types for graphchat
//!
//! This crate provides the wire protocol shared with the knowledge-graph
//! backend and the client-side chat data model.

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Fixed reconnect interval for the streaming channel, in milliseconds.
pub const RECONNECT_INTERVAL_MS: u32 = 5_000;

/// Delay before an errored turn auto-reverts to ready, in milliseconds.
pub const ERROR_RESET_MS: u32 = 1_000;

/// Session identifier issued by the backend (opaque string).
pub type SessionId = String;

// ============================================================================
// Wire Protocol — Streaming Channel
// ============================================================================

/// Messages sent from client to server on the streaming channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientRequest {
    Question {
        question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
}

impl ClientRequest {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }
}

/// Messages sent from server to client on the streaming channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerReply {
    /// A new answer is about to stream.
    Start,
    /// One incremental fragment of the answer text.
    Stream { output: String },
    /// The answer is finished. `generated_cypher` is present when the
    /// backend produced a query for this turn.
    End {
        output: String,
        generated_cypher: Option<String>,
    },
    /// A fatal-for-this-turn condition.
    Error { detail: String },
    /// Diagnostic only; never touches conversation state.
    Debug { detail: String },
}

impl ServerReply {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::from)
    }
}

/// Encode/decode failures on the wire
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed wire message: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Wire Protocol — HTTP
// ============================================================================

/// Body of the credential-requirement check. `output` reports whether a
/// credential is already configured on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasApiKeyResponse {
    pub output: bool,
}

/// Body of the session-id issuance call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdResponse {
    pub session_id: SessionId,
}

/// Body of the chat-history fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryRecord>,
}

/// One stored history record. Extra backend fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl HistoryRecord {
    pub const HUMAN: &'static str = "human";
    pub const AI: &'static str = "ai";
}

/// Body of the chat-history clear
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub success: bool,
}

// ============================================================================
// Chat Messages
// ============================================================================

/// Who a chat message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    UserInput,
    BotText,
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub kind: MessageKind,
    pub text: String,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub generated_query: Option<String>,
}

impl ChatMessage {
    /// A submitted user question; user input is complete on arrival.
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: MessageKind::UserInput,
            text: text.into(),
            complete: true,
            generated_query: None,
        }
    }

    /// The empty placeholder a streamed answer accumulates into.
    pub fn bot_placeholder(id: u64) -> Self {
        Self {
            id,
            kind: MessageKind::BotText,
            text: String::new(),
            complete: false,
            generated_query: None,
        }
    }

    /// Map a stored history record. History is never partial, so both
    /// sides arrive complete. Unknown record kinds map to `None`.
    pub fn from_history(id: u64, record: &HistoryRecord) -> Option<Self> {
        let kind = match record.kind.as_str() {
            HistoryRecord::HUMAN => MessageKind::UserInput,
            HistoryRecord::AI => MessageKind::BotText,
            _ => return None,
        };
        Some(Self {
            id,
            kind,
            text: record.content.clone(),
            complete: true,
            generated_query: None,
        })
    }
}

// ============================================================================
// Session & Preferences
// ============================================================================

/// The durable pairing of a session identifier and optional credential
/// that scopes conversation history on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credential: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            credential: None,
        }
    }
}

/// Durable user preferences, independent of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub dark_mode: bool,
}
