//! Conversation management for graphchat
//!
//! This crate provides the streaming conversation state machine: a typed
//! event enum consumed by one reducer that owns the message log, plus
//! question text normalization.

pub mod conversation;
pub mod question;

// Re-export commonly used items
pub use conversation::{ChatEvent, Conversation, ConversationState, Effect};
pub use question::strip_question_prefix;
