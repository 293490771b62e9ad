//! Interaction state machine
//!
//! Each cycle runs two phases: [`MainController::process_event`] performs the
//! side effect an event asks for, and [`MainController::process_result`]
//! decides what comes next. Events with an error status end the run.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::assistant::{SessionSignal, StreamingEngine};
use crate::events::{ApplicationEvent, EventKind, Payload, ProcessingStatus, Snapshot};
use crate::tools::zapier::{SENT_OUTPUT, message_from_arguments};
use crate::tools::{Notifier, ToolCallBatch, snapshot_prompt};
use crate::vision::Camera;
use crate::voice::{Cue, Player, Recorder, Synthesizer, Transcriber, WordSource};
use crate::{Error, Result};

/// Recording and picture flags consulted by phrase rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes {
    /// Microphone recording is running
    pub is_recording: bool,
    /// Next transcription goes through a snapshot first
    pub picture_mode: bool,
}

/// One keyword transition out of `Listen`
pub struct PhraseRule {
    /// Substring the detected phrase must contain
    pub keyword: &'static str,
    /// Guard on the current modes
    pub applies: fn(&Modes) -> bool,
    /// Event to emit when the rule matches
    pub next: EventKind,
}

const fn not_recording(modes: &Modes) -> bool {
    !modes.is_recording
}

const fn not_in_picture_mode(modes: &Modes) -> bool {
    !modes.picture_mode
}

const fn recording(modes: &Modes) -> bool {
    modes.is_recording
}

/// Phrase rules in priority order; the first match wins
pub const PHRASE_RULES: &[PhraseRule] = &[
    PhraseRule {
        keyword: "computer",
        applies: not_recording,
        next: EventKind::StartRecording,
    },
    PhraseRule {
        keyword: "snapshot",
        applies: not_in_picture_mode,
        next: EventKind::UseSnapshot,
    },
    PhraseRule {
        keyword: "reply",
        applies: recording,
        next: EventKind::StopRecording,
    },
];

/// Event following a detected phrase; `Listen` when no rule applies
#[must_use]
pub fn next_for_phrase(phrase: &str, modes: &Modes) -> EventKind {
    let phrase = phrase.to_lowercase();
    PHRASE_RULES
        .iter()
        .find(|rule| phrase.contains(rule.keyword) && (rule.applies)(modes))
        .map_or(EventKind::Listen, |rule| rule.next)
}

/// Everything the controller drives besides the assistant
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Box<dyn Player>,
    pub words: Box<dyn WordSource>,
    pub recorder: Box<dyn Recorder>,
    pub camera: Arc<dyn Camera>,
    pub notifier: Arc<dyn Notifier>,
}

/// Sequences one event at a time from `Start` to `Exit`
pub struct MainController {
    engine: StreamingEngine,
    idle_rx: mpsc::UnboundedReceiver<SessionSignal>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    player: Box<dyn Player>,
    words: Box<dyn WordSource>,
    recorder: Box<dyn Recorder>,
    camera: Arc<dyn Camera>,
    notifier: Arc<dyn Notifier>,
    modes: Modes,
    greeting: String,
}

impl MainController {
    /// Create a controller
    ///
    /// `idle_rx` is the receiver paired with the engine's session.
    #[must_use]
    pub fn new(
        engine: StreamingEngine,
        idle_rx: mpsc::UnboundedReceiver<SessionSignal>,
        collaborators: Collaborators,
        greeting: impl Into<String>,
    ) -> Self {
        let Collaborators {
            transcriber,
            synthesizer,
            player,
            words,
            recorder,
            camera,
            notifier,
        } = collaborators;

        Self {
            engine,
            idle_rx,
            transcriber,
            synthesizer,
            player,
            words,
            recorder,
            camera,
            notifier,
            modes: Modes::default(),
            greeting: greeting.into(),
        }
    }

    /// Current recording and picture flags
    #[must_use]
    pub const fn modes(&self) -> Modes {
        self.modes
    }

    /// Assistant engine
    #[must_use]
    pub const fn engine(&self) -> &StreamingEngine {
        &self.engine
    }

    /// Drive events from `start` until `Exit`
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventFailed`] for the first event that fails
    pub async fn run(&mut self, start: ApplicationEvent) -> Result<()> {
        self.player.play_cue(Cue::Listening);
        let mut event = start;

        loop {
            self.drain_signals();

            if event.kind == EventKind::Exit {
                tracing::info!("interaction loop finished");
                return Ok(());
            }

            let processed = self.process_event(event).await;
            check(&processed)?;

            event = self.process_result(processed).await;
            check(&event)?;
        }
    }

    /// Perform the side effect `event` asks for
    ///
    /// Returns the same event with its outcome filled in, or a follow-up
    /// event in [`ProcessingStatus::Init`] for steps that only redirect.
    pub async fn process_event(&mut self, event: ApplicationEvent) -> ApplicationEvent {
        tracing::debug!(kind = %event.kind, request = event.request.variant(), "processing event");

        match event.kind {
            EventKind::Start => {
                ApplicationEvent::with_request(EventKind::Synthesize, self.greeting.clone())
            }
            EventKind::Synthesize => {
                let Some(text) = event.request.as_text() else {
                    return unexpected_request(event);
                };
                match self.synthesizer.synthesize(text).await {
                    Ok(audio) => event.succeed(audio),
                    Err(e) => event.fail(e),
                }
            }
            EventKind::Play => {
                let Payload::Audio(audio) = &event.request else {
                    return unexpected_request(event);
                };
                match self.player.play(audio).await {
                    Ok(()) => event.succeed(Payload::None),
                    Err(e) => event.fail(e),
                }
            }
            EventKind::Listen => self.listen(event).await,
            EventKind::StartRecording => {
                self.player.play_cue(Cue::StartRecording);
                if let Err(e) = self.recorder.start() {
                    return event.fail(e);
                }
                self.modes.is_recording = true;
                ApplicationEvent::new(EventKind::Listen)
            }
            EventKind::UseSnapshot => {
                self.player.play_cue(Cue::Snapshot);
                if self.modes.is_recording {
                    self.modes.picture_mode = true;
                    tracing::info!("picture mode armed");
                }
                ApplicationEvent::new(EventKind::Listen)
            }
            EventKind::StopRecording => {
                self.player.play_cue(Cue::Respond);
                match self.recorder.stop() {
                    Ok(path) => {
                        self.words.clear();
                        self.modes.is_recording = false;
                        ApplicationEvent::with_request(EventKind::Transcribe, path)
                    }
                    Err(e) => event.fail(e),
                }
            }
            EventKind::Transcribe => {
                let Payload::Path(path) = &event.request else {
                    return unexpected_request(event);
                };
                match self.transcriber.transcribe_file(path).await {
                    Ok(text) => {
                        tracing::info!(transcript = %text, "transcribed recording");
                        event.succeed(text)
                    }
                    Err(e) => event.fail(e),
                }
            }
            EventKind::GetSnapshot => {
                let prompt = event.request.as_text().unwrap_or_default().to_string();
                match self.camera.capture().await {
                    Ok(Some(image)) => {
                        tracing::info!(image = %image.display(), "snapshot taken");
                        event.succeed(Snapshot { prompt, image })
                    }
                    Ok(None) => event.fail(Error::Capture("camera produced no image".to_string())),
                    Err(e) => event.fail(e),
                }
            }
            EventKind::AiInteract | EventKind::AiToolReturn => self.engine.run_turn(event).await,
            EventKind::Zapier => {
                let text = event.request.as_text().unwrap_or_default().to_string();
                match self.notifier.send(&text).await {
                    Ok(()) => event.succeed(SENT_OUTPUT),
                    Err(e) => event.fail(e),
                }
            }
            EventKind::Exit => event.succeed(Payload::None),
        }
    }

    /// Compute the next event from a processed one
    ///
    /// Undispatched events pass through unchanged, as do failed ones.
    pub async fn process_result(&mut self, event: ApplicationEvent) -> ApplicationEvent {
        if event.status != ProcessingStatus::Success {
            return event;
        }

        let kind = event.kind;
        match (kind, event.result) {
            (EventKind::Synthesize, Payload::Audio(audio)) => {
                ApplicationEvent::with_request(EventKind::Play, audio)
            }
            (EventKind::Play, _) => ApplicationEvent::new(EventKind::Listen),
            (EventKind::Listen, Payload::Text(phrase)) => {
                let next = next_for_phrase(&phrase, &self.modes);
                tracing::debug!(phrase = %phrase, next = %next, "phrase dispatched");
                ApplicationEvent::new(next)
            }
            (EventKind::Transcribe, Payload::Text(text)) => {
                let next = if self.modes.picture_mode {
                    EventKind::GetSnapshot
                } else {
                    EventKind::AiInteract
                };
                ApplicationEvent::with_request(next, text)
            }
            (EventKind::GetSnapshot, Payload::Snapshot(snapshot)) => {
                self.modes.picture_mode = false;
                ApplicationEvent::with_request(EventKind::AiInteract, snapshot)
            }
            (EventKind::AiInteract | EventKind::AiToolReturn, Payload::Text(reply)) => {
                tracing::info!(reply = %reply, "assistant replied");
                ApplicationEvent::with_request(EventKind::Synthesize, reply)
            }
            (EventKind::AiInteract | EventKind::AiToolReturn, Payload::ToolCalls(batch)) => {
                let batch = self.resolve_tools(batch).await;
                ApplicationEvent::with_request(EventKind::AiToolReturn, batch)
            }
            (
                EventKind::Synthesize
                | EventKind::Listen
                | EventKind::Transcribe
                | EventKind::GetSnapshot
                | EventKind::AiInteract
                | EventKind::AiToolReturn,
                result,
            ) => ApplicationEvent::new(kind).fail(format!("unexpected {} result", result.variant())),
            _ => ApplicationEvent::new(EventKind::Listen),
        }
    }

    /// Run every call of a paused run in order and attach its output
    ///
    /// Failures become the call's output so the assistant can react to them.
    async fn resolve_tools(&mut self, mut batch: ToolCallBatch) -> ToolCallBatch {
        for call in &mut batch.calls {
            let request = match call.kind {
                EventKind::GetSnapshot => snapshot_prompt(&call.arguments),
                EventKind::Zapier => message_from_arguments(&call.arguments),
                _ => call.arguments.clone(),
            };

            let outcome = self
                .process_event(ApplicationEvent::with_request(call.kind, request))
                .await;

            let output = if outcome.is_error() {
                format!("Error: {}", outcome.error)
            } else {
                match &outcome.result {
                    Payload::Text(text) => text.clone(),
                    Payload::Snapshot(snapshot) => match self.engine.describe_snapshot(snapshot).await {
                        Ok(description) => description,
                        Err(e) => format!("Error: {e}"),
                    },
                    _ => String::new(),
                }
            };

            tracing::info!(
                call_id = %call.call_id,
                kind = %call.kind,
                output = %output,
                "tool call resolved"
            );
            call.output = Some(output);
        }

        batch
    }

    /// Wait for the next word, applying idle signals while waiting
    async fn listen(&mut self, event: ApplicationEvent) -> ApplicationEvent {
        loop {
            tokio::select! {
                word = self.words.next_word() => {
                    return match word {
                        Ok(word) => event.succeed(word),
                        Err(e) => event.fail(e),
                    };
                }
                Some(signal) = self.idle_rx.recv() => self.apply_signal(signal),
            }
        }
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.idle_rx.try_recv() {
            self.apply_signal(signal);
        }
    }

    fn apply_signal(&mut self, signal: SessionSignal) {
        if self.engine.session_mut().handle_signal(signal) {
            self.player.play_cue(Cue::IdleReset);
        }
    }
}

fn unexpected_request(event: ApplicationEvent) -> ApplicationEvent {
    let message = format!("{} cannot handle a {} request", event.kind, event.request.variant());
    event.fail(message)
}

fn check(event: &ApplicationEvent) -> Result<()> {
    if event.is_error() {
        tracing::error!(kind = %event.kind, error = %event.error, "event failed");
        return Err(Error::EventFailed {
            kind: event.kind,
            message: event.error.clone(),
        });
    }
    Ok(())
}
