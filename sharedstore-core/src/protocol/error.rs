//! Protocol and channel error types

use thiserror::Error;

/// Errors decoding or interpreting an envelope
///
/// None of these escape the event loops: a context logs them and moves on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Payload does not carry the protocol tag")]
    TagMismatch,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Bad arguments for {operation}: {reason}")]
    BadArguments { operation: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors posting to a message port
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receiving context has terminated
    #[error("Channel disconnected: receiving context has terminated")]
    Disconnected,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] ProtocolError),
}
