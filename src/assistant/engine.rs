//! Drives one assistant turn to a terminal outcome

use std::sync::Arc;

use futures::StreamExt;

use super::client::AssistantBackend;
use super::session::Session;
use super::stream::{RunStream, StreamEvent};
use crate::events::{ApplicationEvent, EventKind, Payload, Snapshot};
use crate::tools::{self, ToolCallBatch};
use crate::{Error, Result};

/// Message reported when the backend fails a run
pub const RUN_FAILED_MESSAGE: &str = "assistant run failed";

/// Outcome of one streamed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamingResult {
    /// Run completed with the accumulated reply
    Success {
        /// Concatenated text deltas
        response: String,
    },
    /// Run paused on tool calls
    ActionRequired(ToolCallBatch),
    /// Run failed
    Failed {
        /// Failure description
        error: String,
    },
}

/// Runs assistant turns against a single session
pub struct StreamingEngine {
    backend: Arc<dyn AssistantBackend>,
    session: Session,
    assistant_id: String,
}

impl StreamingEngine {
    /// Create an engine over `backend` using `session` for thread state
    #[must_use]
    pub fn new(backend: Arc<dyn AssistantBackend>, session: Session, assistant_id: String) -> Self {
        Self {
            backend,
            session,
            assistant_id,
        }
    }

    /// Session shared by every turn
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session access for idle-signal handling
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Run one `AiInteract` or `AiToolReturn` event and fill in its outcome
    ///
    /// Successful runs leave a text result, paused runs a [`Payload::ToolCalls`]
    /// result. Failures of any kind end the interaction and mark the event
    /// failed.
    pub async fn run_turn(&mut self, event: ApplicationEvent) -> ApplicationEvent {
        match self.drive(&event).await {
            Ok(StreamingResult::Success { response }) => event.succeed(response),
            Ok(StreamingResult::ActionRequired(batch)) => event.succeed(batch),
            Ok(StreamingResult::Failed { error }) => event.fail(error),
            Err(Error::InteractionInProgress) => {
                // Leave the running turn alone
                event.fail(Error::InteractionInProgress)
            }
            Err(e) => {
                tracing::error!(kind = %event.kind, error = %e, "assistant turn failed");
                if self.session.interaction_in_progress() {
                    self.session.finish_interaction();
                }
                event.fail(e)
            }
        }
    }

    async fn drive(&mut self, event: &ApplicationEvent) -> Result<StreamingResult> {
        let stream = match (event.kind, &event.request) {
            (EventKind::AiInteract, request) => {
                let content = self.message_content(request).await?;
                let thread_id = self
                    .session
                    .begin_interaction(self.backend.as_ref(), &content)
                    .await?;
                tracing::info!(thread_id = %thread_id, "starting assistant run");
                self.backend
                    .stream_run(&thread_id, &self.assistant_id)
                    .await
                    .map_err(|e| Error::BackendUnavailable(e.to_string()))?
            }
            (EventKind::AiToolReturn, Payload::ToolCalls(batch)) => {
                tracing::info!(
                    run_id = %batch.run_id,
                    outputs = batch.calls.len(),
                    "resuming assistant run with tool outputs"
                );
                self.backend
                    .submit_tool_outputs(&batch.thread_id, &batch.run_id, batch.outputs())
                    .await
                    .map_err(|e| Error::BackendUnavailable(e.to_string()))?
            }
            (kind, request) => {
                return Err(Error::Assistant(format!(
                    "cannot run {kind} with {} request",
                    request.variant()
                )));
            }
        };

        self.consume(stream).await
    }

    async fn message_content(&self, request: &Payload) -> Result<String> {
        match request {
            Payload::Text(text) => Ok(text.clone()),
            Payload::Snapshot(snapshot) => self.describe_snapshot(snapshot).await,
            other => Err(Error::Assistant(format!(
                "no message content in {} request",
                other.variant()
            ))),
        }
    }

    /// Turn a camera picture into text via the backend's vision model
    ///
    /// # Errors
    ///
    /// Returns error if the image cannot be read or described
    pub async fn describe_snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let image = tokio::fs::read(&snapshot.image).await.map_err(|e| {
            Error::Capture(format!("cannot read {}: {e}", snapshot.image.display()))
        })?;
        self.backend.describe_image(&snapshot.prompt, &image).await
    }

    /// Consume run events until the run completes, fails or pauses
    async fn consume(&mut self, mut stream: RunStream) -> Result<StreamingResult> {
        let mut response = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::MessageDelta(Some(fragment)) => response.push_str(&fragment),
                StreamEvent::MessageDelta(None) => {}
                StreamEvent::RequiresAction(action) => {
                    let batch = tools::resolve_action(&action)?;
                    return Ok(StreamingResult::ActionRequired(batch));
                }
                StreamEvent::RunCompleted => {
                    self.session.finish_interaction();
                    tracing::info!(chars = response.len(), "assistant run completed");
                    return Ok(StreamingResult::Success { response });
                }
                StreamEvent::RunFailed => {
                    self.session.finish_interaction();
                    tracing::warn!("assistant run failed");
                    return Ok(StreamingResult::Failed {
                        error: RUN_FAILED_MESSAGE.to_string(),
                    });
                }
                StreamEvent::Other(name) => tracing::trace!(event = %name, "ignoring run event"),
            }
        }

        Err(Error::Transport(
            "run stream ended without a terminal event".to_string(),
        ))
    }
}
