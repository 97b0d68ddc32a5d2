//! Shared protocol types for the approval coordinator, chat adapters and
//! speech-to-text.
//!
//! This crate defines the approval data model, the chat/transcription
//! boundary traits and strongly-typed error enums shared across the workspace.

pub mod approval;
pub mod chat;
pub mod error;
pub mod speech;

/// Re-export of approval request/decision types.
pub use approval::{
    APPROVED_REASON, ApprovalAck, ApprovalRequest, ApprovalResult, Callback,
    DEFAULT_TIMEOUT_REASON, DENIED_REASON, Decision, DecisionPayload, Link, Markup,
};
/// Re-export of chat boundary types.
pub use chat::{
    Button, ChatTransport, Keyboard, MessageBody, MessageId, OutgoingMessage, ReviewerAction,
    ReviewerMessage, ReviewerUpdate, VoiceFile,
};
/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of speech-to-text types.
pub use speech::{AudioClip, Transcriber};
