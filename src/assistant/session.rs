//! Conversation thread lifecycle
//!
//! One thread handle is kept per process. It is reused across turns until it
//! sits idle for the configured timeout, after which the next turn starts a
//! fresh thread. Expiry is not applied from the timer task itself: the task
//! posts a [`SessionSignal`] that the controller drains on its own thread and
//! hands back to [`Session::handle_signal`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::client::AssistantBackend;
use crate::{Error, Result};

/// Idle time after which a thread is discarded
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Notifications posted by session background tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The idle timer armed as `generation` ran out
    IdleExpired {
        /// Arming this expiry belongs to
        generation: u64,
    },
}

/// Thread handle, mutual-exclusion flag and idle timer
pub struct Session {
    thread_id: Option<String>,
    interaction_in_progress: bool,
    idle_timeout: Duration,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl Session {
    /// Create an empty session and the receiver its timer reports to
    #[must_use]
    pub fn new(idle_timeout: Duration) -> (Self, mpsc::UnboundedReceiver<SessionSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let session = Self {
            thread_id: None,
            interaction_in_progress: false,
            idle_timeout,
            generation: 0,
            timer: None,
            signals,
        };
        (session, rx)
    }

    /// Current thread handle
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Whether a turn is running against the thread
    #[must_use]
    pub const fn interaction_in_progress(&self) -> bool {
        self.interaction_in_progress
    }

    /// Configured idle timeout
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of times the idle timer has been armed
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Return the current thread, creating one when there is none or when an
    /// interaction still holds the current one
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the backend cannot create a
    /// thread
    pub async fn obtain_thread(&mut self, backend: &dyn AssistantBackend) -> Result<String> {
        if let Some(id) = self.thread_id.as_ref().filter(|_| !self.interaction_in_progress) {
            return Ok(id.clone());
        }

        match backend.create_thread().await {
            Ok(id) => {
                tracing::debug!(thread_id = %id, "new conversation thread");
                self.thread_id = Some(id.clone());
                Ok(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create conversation thread");
                Err(Error::BackendUnavailable(e.to_string()))
            }
        }
    }

    /// Append a user message to the current thread
    ///
    /// Returns `false` without touching the backend when there is no thread
    /// or an interaction is already in progress.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the message
    pub async fn append_message(
        &mut self,
        backend: &dyn AssistantBackend,
        content: &str,
    ) -> Result<bool> {
        let Some(thread_id) = &self.thread_id else {
            tracing::warn!("no conversation thread, message dropped");
            return Ok(false);
        };

        if self.interaction_in_progress {
            tracing::warn!(thread_id = %thread_id, "interaction in progress, message dropped");
            return Ok(false);
        }

        backend.add_message(thread_id, content).await?;
        Ok(true)
    }

    /// Post `content` to a thread and mark the interaction as running
    ///
    /// # Errors
    ///
    /// Returns [`Error::InteractionInProgress`] if a turn is still running,
    /// [`Error::BackendUnavailable`] if no thread can be obtained, or the
    /// backend error if the message is rejected
    pub async fn begin_interaction(
        &mut self,
        backend: &dyn AssistantBackend,
        content: &str,
    ) -> Result<String> {
        if self.interaction_in_progress {
            return Err(Error::InteractionInProgress);
        }

        let thread_id = self.obtain_thread(backend).await?;
        if !self.append_message(backend, content).await? {
            return Err(Error::InteractionInProgress);
        }

        self.interaction_in_progress = true;
        self.arm_idle_timer();
        Ok(thread_id)
    }

    /// Cancel any running idle timer and start a new one
    pub fn arm_idle_timer(&mut self) {
        self.cancel_timer();
        self.generation += 1;

        let generation = self.generation;
        let timeout = self.idle_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let signals = self.signals.clone();

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver gone means the controller is shutting down
            let _ = signals.send(SessionSignal::IdleExpired { generation });
        }));

        tracing::trace!(generation, timeout_secs = timeout.as_secs(), "idle timer armed");
    }

    /// A turn reached a terminal outcome; the thread stays until idle
    pub fn end_interaction(&mut self) {
        self.arm_idle_timer();
    }

    /// Release the interaction flag and restart the idle timer
    pub fn finish_interaction(&mut self) {
        self.interaction_in_progress = false;
        self.end_interaction();
    }

    /// Apply a signal from the timer task
    ///
    /// Returns `true` when the session was reset. Expiries from a timer that
    /// has since been re-armed are ignored. An expiry that arrives while a
    /// turn is running re-arms the timer instead, so the turn finishes
    /// against the thread it started on.
    pub fn handle_signal(&mut self, signal: SessionSignal) -> bool {
        match signal {
            SessionSignal::IdleExpired { generation } => {
                if generation != self.generation {
                    tracing::trace!(generation, current = self.generation, "stale idle expiry");
                    return false;
                }

                if self.interaction_in_progress {
                    tracing::debug!("idle expiry during interaction, deferring");
                    self.arm_idle_timer();
                    return false;
                }

                tracing::info!(
                    thread_id = self.thread_id.as_deref().unwrap_or("-"),
                    "conversation idle, resetting thread"
                );
                self.reset();
                true
            }
        }
    }

    /// Forget the thread and clear the interaction flag
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.thread_id = None;
        self.interaction_in_progress = false;
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
