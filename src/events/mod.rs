//! Application events flowing through the interaction controller
//!
//! Every step of the voice loop is an [`ApplicationEvent`]: the controller
//! dispatches it to a collaborator, which fills in `status` plus either
//! `result` or `error`, and the controller computes the next event from it.

use std::fmt;
use std::path::PathBuf;

use crate::tools::ToolCallBatch;

/// Closed set of event types the controller understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Loop entry point
    Start,
    /// Turn text into speech
    Synthesize,
    /// Play synthesized audio
    Play,
    /// Wait for the next detected keyword
    Listen,
    /// Begin microphone capture
    StartRecording,
    /// Arm picture mode for the current recording
    UseSnapshot,
    /// End microphone capture
    StopRecording,
    /// Speech-to-text on the recorded file
    Transcribe,
    /// Capture a camera picture
    GetSnapshot,
    /// Send a user message to the assistant
    AiInteract,
    /// Resubmit resolved tool outputs to the assistant
    AiToolReturn,
    /// Outbound text message through the Zapier webhook
    Zapier,
    /// Terminal state
    Exit,
}

impl EventKind {
    /// Stable lowercase name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Synthesize => "synthesize",
            Self::Play => "play",
            Self::Listen => "listen",
            Self::StartRecording => "start_recording",
            Self::UseSnapshot => "use_snapshot",
            Self::StopRecording => "stop_recording",
            Self::Transcribe => "transcribe",
            Self::GetSnapshot => "get_snapshot",
            Self::AiInteract => "ai_interact",
            Self::AiToolReturn => "ai_tool_return",
            Self::Zapier => "zapier",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStatus {
    /// Not dispatched yet
    #[default]
    Init,
    /// Handler succeeded; `result` is meaningful
    Success,
    /// Handler failed; `error` is meaningful
    Error,
}

/// A captured picture together with the prompt it should answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// What the user asked about the picture
    pub prompt: String,
    /// Where the camera wrote the image
    pub image: PathBuf,
}

/// Typed request/result payload carried by an event
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Nothing attached
    #[default]
    None,
    /// Plain text (prompts, transcripts, replies, tool arguments)
    Text(String),
    /// Encoded audio bytes
    Audio(Vec<u8>),
    /// A file on disk
    Path(PathBuf),
    /// A camera picture plus its prompt
    Snapshot(Snapshot),
    /// Pending or resolved tool calls for one assistant run
    ToolCalls(ToolCallBatch),
}

impl Payload {
    /// Text content, if this payload is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Short variant name for logs and error messages
    #[must_use]
    pub const fn variant(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Text(_) => "text",
            Self::Audio(_) => "audio",
            Self::Path(_) => "path",
            Self::Snapshot(_) => "snapshot",
            Self::ToolCalls(_) => "tool_calls",
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// The universal message unit of the interaction loop
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationEvent {
    /// What should happen
    pub kind: EventKind,
    /// Input for the handler
    pub request: Payload,
    /// Output produced by the handler
    pub result: Payload,
    /// Failure description, empty unless `status` is `Error`
    pub error: String,
    /// Processing state
    pub status: ProcessingStatus,
}

impl ApplicationEvent {
    /// Create an undispatched event with no request
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            request: Payload::None,
            result: Payload::None,
            error: String::new(),
            status: ProcessingStatus::Init,
        }
    }

    /// Create an undispatched event carrying a request
    #[must_use]
    pub fn with_request(kind: EventKind, request: impl Into<Payload>) -> Self {
        Self {
            request: request.into(),
            ..Self::new(kind)
        }
    }

    /// Mark the event successful with the given result
    #[must_use]
    pub fn succeed(mut self, result: impl Into<Payload>) -> Self {
        self.result = result.into();
        self.error.clear();
        self.status = ProcessingStatus::Success;
        self
    }

    /// Mark the event failed; any previous result is dropped
    #[must_use]
    pub fn fail(mut self, error: impl fmt::Display) -> Self {
        self.result = Payload::None;
        self.error = error.to_string();
        self.status = ProcessingStatus::Error;
        self
    }

    /// Whether the handler succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }

    /// Whether the handler failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ProcessingStatus::Error
    }
}

impl From<ToolCallBatch> for Payload {
    fn from(batch: ToolCallBatch) -> Self {
        Self::ToolCalls(batch)
    }
}

impl From<Snapshot> for Payload {
    fn from(snapshot: Snapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(audio: Vec<u8>) -> Self {
        Self::Audio(audio)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
