//! Error types for Heddy

use thiserror::Error;

use crate::events::EventKind;

/// Result type alias for Heddy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Heddy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Assistant thread or stream could not be created
    #[error("assistant backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Assistant requested a function we have no handler for
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    /// Network-level failure while talking to a hosted service
    #[error("transport error: {0}")]
    Transport(String),

    /// Camera or microphone capture failed
    #[error("capture failure: {0}")]
    Capture(String),

    /// Speech-to-text failed
    #[error("transcription failure: {0}")]
    Transcription(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Assistant protocol error (unexpected payloads, malformed events)
    #[error("assistant error: {0}")]
    Assistant(String),

    /// Tool side-effect failed
    #[error("tool error: {0}")]
    Tool(String),

    /// A message was sent while the previous interaction is still running
    #[error("previous interaction still in progress")]
    InteractionInProgress,

    /// A dispatched event finished with an error status
    #[error("{kind} failed: {message}")]
    EventFailed {
        /// Kind of the failing event
        kind: EventKind,
        /// Error description carried by the event
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
