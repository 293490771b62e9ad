//! Shared test utilities
//!
//! In-memory stand-ins for every collaborator the controller drives, plus a
//! scripted assistant backend. Each fake records what it was asked to do in
//! a shared [`Log`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use heddy::assistant::{RequiredAction, RequiredToolCall, RunStream};
use heddy::tools::Notifier;
use heddy::vision::Camera;
use heddy::voice::{Cue, Player, Recorder, Synthesizer, Transcriber, WordSource};
use heddy::{
    AssistantBackend, Collaborators, Error, MainController, Result, Session, SessionSignal,
    StreamEvent, StreamingEngine, ToolOutput,
};

/// Everything the fakes observed
#[derive(Debug, Default)]
pub struct Log {
    pub threads_created: usize,
    pub messages: Vec<(String, String)>,
    pub runs_started: Vec<String>,
    pub submitted: Vec<(String, Vec<ToolOutput>)>,
    pub described: Vec<String>,
    pub cues: Vec<Cue>,
    pub played: usize,
    pub synthesized: Vec<String>,
    pub recordings_started: usize,
    pub recordings_stopped: usize,
    pub words_cleared: usize,
    pub sent_texts: Vec<String>,
}

pub type SharedLog = Arc<Mutex<Log>>;

/// Assistant backend replaying scripted runs
///
/// Each call to `stream_run` or `submit_tool_outputs` consumes the next
/// script entry.
pub struct FakeBackend {
    log: SharedLog,
    runs: Mutex<VecDeque<Vec<StreamEvent>>>,
    fail_thread_creation: bool,
}

impl FakeBackend {
    pub fn new(log: SharedLog, runs: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            log,
            runs: Mutex::new(runs.into()),
            fail_thread_creation: false,
        }
    }

    pub fn unavailable(log: SharedLog) -> Self {
        Self {
            log,
            runs: Mutex::new(VecDeque::new()),
            fail_thread_creation: true,
        }
    }

    fn next_run(&self) -> Result<RunStream> {
        let events = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("no scripted run left".to_string()))?;
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

#[async_trait]
impl AssistantBackend for FakeBackend {
    async fn create_thread(&self) -> Result<String> {
        if self.fail_thread_creation {
            return Err(Error::Transport("connection refused".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        log.threads_created += 1;
        Ok(format!("thread_{}", log.threads_created))
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .messages
            .push((thread_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn stream_run(&self, thread_id: &str, _assistant_id: &str) -> Result<RunStream> {
        self.log
            .lock()
            .unwrap()
            .runs_started
            .push(thread_id.to_string());
        self.next_run()
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream> {
        self.log
            .lock()
            .unwrap()
            .submitted
            .push((run_id.to_string(), outputs));
        self.next_run()
    }

    async fn describe_image(&self, prompt: &str, _image: &[u8]) -> Result<String> {
        self.log.lock().unwrap().described.push(prompt.to_string());
        Ok(format!("a picture answering: {prompt}"))
    }
}

/// Text delta event
pub fn delta(text: &str) -> StreamEvent {
    StreamEvent::MessageDelta(Some(text.to_string()))
}

/// Paused run asking for `calls` as (name, arguments) pairs
pub fn requires_action(run_id: &str, calls: &[(&str, &str)]) -> StreamEvent {
    StreamEvent::RequiresAction(RequiredAction {
        run_id: run_id.to_string(),
        thread_id: "thread_1".to_string(),
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| RequiredToolCall {
                id: format!("call_{i}"),
                name: (*name).to_string(),
                arguments: (*arguments).to_string(),
            })
            .collect(),
    })
}

/// Word queue
///
/// Once empty it either ends listening with a capture error or, when held
/// open, waits forever like a quiet room.
pub struct FakeWords {
    log: SharedLog,
    words: VecDeque<String>,
    hold_open: bool,
}

#[async_trait]
impl WordSource for FakeWords {
    async fn next_word(&mut self) -> Result<String> {
        match self.words.pop_front() {
            Some(word) => Ok(word),
            None if self.hold_open => std::future::pending().await,
            None => Err(Error::Capture("microphone closed".to_string())),
        }
    }

    fn clear(&mut self) {
        self.log.lock().unwrap().words_cleared += 1;
    }
}

/// Player that only counts
pub struct FakePlayer {
    log: SharedLog,
}

#[async_trait]
impl Player for FakePlayer {
    async fn play(&mut self, _audio: &[u8]) -> Result<()> {
        self.log.lock().unwrap().played += 1;
        Ok(())
    }

    fn play_cue(&mut self, cue: Cue) {
        self.log.lock().unwrap().cues.push(cue);
    }
}

pub struct FakeRecorder {
    log: SharedLog,
    path: PathBuf,
}

impl Recorder for FakeRecorder {
    fn start(&mut self) -> Result<()> {
        self.log.lock().unwrap().recordings_started += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<PathBuf> {
        self.log.lock().unwrap().recordings_stopped += 1;
        Ok(self.path.clone())
    }
}

/// Transcriber returning a fixed transcript
pub struct FakeTranscriber {
    pub transcript: String,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(self.transcript.clone())
    }

    async fn transcribe_file(&self, _path: &Path) -> Result<String> {
        Ok(self.transcript.clone())
    }
}

pub struct FakeSynthesizer {
    log: SharedLog,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.log.lock().unwrap().synthesized.push(text.to_string());
        Ok(text.as_bytes().to_vec())
    }
}

/// Camera handing out a fixed picture, or none
pub struct FakeCamera {
    pub picture: Option<PathBuf>,
}

#[async_trait]
impl Camera for FakeCamera {
    async fn capture(&self) -> Result<Option<PathBuf>> {
        Ok(self.picture.clone())
    }
}

pub struct FakeNotifier {
    log: SharedLog,
    fail: bool,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Tool("webhook returned 500".to_string()));
        }
        self.log.lock().unwrap().sent_texts.push(text.to_string());
        Ok(())
    }
}

/// Builder for a controller wired to fakes
pub struct Harness {
    pub log: SharedLog,
    pub words: Vec<String>,
    pub runs: Vec<Vec<StreamEvent>>,
    pub transcript: String,
    pub picture: Option<PathBuf>,
    pub notifier_fails: bool,
    pub backend_unavailable: bool,
    pub words_stay_open: bool,
    pub idle_timeout: Duration,
    dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let picture = dir.path().join("snapshot.png");
        std::fs::write(&picture, b"\x89PNG fake").unwrap();

        Self {
            log: SharedLog::default(),
            words: Vec::new(),
            runs: Vec::new(),
            transcript: String::new(),
            picture: Some(picture),
            notifier_fails: false,
            backend_unavailable: false,
            words_stay_open: false,
            idle_timeout: Duration::from_secs(90),
            dir,
        }
    }

    pub fn words(mut self, words: &[&str]) -> Self {
        self.words = words.iter().map(ToString::to_string).collect();
        self
    }

    pub fn run(mut self, events: Vec<StreamEvent>) -> Self {
        self.runs.push(events);
        self
    }

    pub fn transcript(mut self, text: &str) -> Self {
        self.transcript = text.to_string();
        self
    }

    /// Build the controller; the temp dir lives as long as the returned guard
    pub fn build(self) -> (MainController, SharedLog, tempfile::TempDir) {
        let (engine, idle_rx) = self.engine();
        let log = Arc::clone(&self.log);

        let collaborators = Collaborators {
            transcriber: Arc::new(FakeTranscriber {
                transcript: self.transcript,
            }),
            synthesizer: Arc::new(FakeSynthesizer {
                log: Arc::clone(&log),
            }),
            player: Box::new(FakePlayer {
                log: Arc::clone(&log),
            }),
            words: Box::new(FakeWords {
                log: Arc::clone(&log),
                words: self.words.into(),
                hold_open: self.words_stay_open,
            }),
            recorder: Box::new(FakeRecorder {
                log: Arc::clone(&log),
                path: self.dir.path().join("recorded_audio.wav"),
            }),
            camera: Arc::new(FakeCamera {
                picture: self.picture,
            }),
            notifier: Arc::new(FakeNotifier {
                log: Arc::clone(&log),
                fail: self.notifier_fails,
            }),
        };

        let controller = MainController::new(engine, idle_rx, collaborators, "hello");
        (controller, log, self.dir)
    }

    fn engine(&self) -> (StreamingEngine, mpsc::UnboundedReceiver<SessionSignal>) {
        let backend = if self.backend_unavailable {
            FakeBackend::unavailable(Arc::clone(&self.log))
        } else {
            FakeBackend::new(Arc::clone(&self.log), self.runs.clone())
        };
        let (session, idle_rx) = Session::new(self.idle_timeout);
        (
            StreamingEngine::new(Arc::new(backend), session, "asst_test".to_string()),
            idle_rx,
        )
    }
}
