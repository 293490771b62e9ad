//! Conversational assistant backend
//!
//! - [`session`]: thread handle, mutual exclusion and idle timeout
//! - [`stream`]: typed run-stream events decoded from SSE
//! - [`client`]: backend trait and the hosted implementation
//! - [`engine`]: runs one turn and reports a [`StreamingResult`]

pub mod client;
pub mod engine;
pub mod session;
pub mod sse;
pub mod stream;

pub use client::{AssistantBackend, OpenAiAssistant};
pub use engine::{StreamingEngine, StreamingResult};
pub use session::{DEFAULT_IDLE_TIMEOUT, Session, SessionSignal};
pub use stream::{RequiredAction, RequiredToolCall, RunStream, StreamEvent};
