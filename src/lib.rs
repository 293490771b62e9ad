//! Heddy - voice-activated assistant loop
//!
//! Keywords start and stop a recording, the recording is transcribed and
//! sent to a hosted assistant, and the reply is spoken back. The assistant
//! may call tools (outbound text messages, camera snapshots) before it
//! answers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  MainController                     │
//! │  process_event ──► ApplicationEvent ──► process_result │
//! └──────┬──────────────┬───────────────┬───────────────┘
//!        │              │               │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼───────────────┐
//! │    Voice    │ │   Vision   │ │  StreamingEngine     │
//! │ keywords    │ │  fswebcam  │ │  Session (thread,    │
//! │ record/STT  │ │            │ │  idle timer), runs,  │
//! │ TTS/play    │ │            │ │  tool-call batches   │
//! └─────────────┘ └────────────┘ └──────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod tools;
pub mod vision;
pub mod voice;

pub use assistant::{
    AssistantBackend, OpenAiAssistant, Session, SessionSignal, StreamEvent, StreamingEngine,
    StreamingResult,
};
pub use config::Config;
pub use controller::{Collaborators, MainController};
pub use error::{Error, Result};
pub use events::{ApplicationEvent, EventKind, Payload, ProcessingStatus, Snapshot};
pub use tools::{ToolCall, ToolCallBatch, ToolOutput};
