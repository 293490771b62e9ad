//! Background keyword listening
//!
//! A worker thread owns the microphone, cuts speech into utterances,
//! transcribes them and queues every spotted keyword. The controller pulls
//! words off the queue while it is in the listen state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::capture::{AudioCapture, samples_to_wav};
use super::stt::Transcriber;
use super::wake_word::KeywordSpotter;
use crate::{Error, Result};

/// How often the worker drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Queue of detected words
#[async_trait]
pub trait WordSource: Send {
    /// Wait for the next detected word, resuming delivery if suspended
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if detection has stopped for good
    async fn next_word(&mut self) -> Result<String>;

    /// Drop pending words and suspend delivery until the next
    /// [`Self::next_word`]
    fn clear(&mut self);
}

/// Microphone keyword listener
pub struct KeywordListener {
    keywords: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
    suspended: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl KeywordListener {
    /// Create a listener; the worker starts on the first [`WordSource::next_word`]
    #[must_use]
    pub fn new(keywords: Vec<String>, transcriber: Arc<dyn Transcriber>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            keywords,
            transcriber,
            tx: Some(tx),
            rx,
            suspended: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };

        let worker = Worker {
            keywords: self.keywords.clone(),
            transcriber: Arc::clone(&self.transcriber),
            runtime: Handle::current(),
            tx,
            suspended: Arc::clone(&self.suspended),
            shutdown: Arc::clone(&self.shutdown),
        };

        let handle = std::thread::Builder::new()
            .name("keyword-listener".to_string())
            .spawn(move || worker.run())
            .map_err(|e| Error::Capture(format!("cannot start keyword listener: {e}")))?;

        self.worker = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl WordSource for KeywordListener {
    async fn next_word(&mut self) -> Result<String> {
        if self.worker.is_none() {
            self.spawn_worker()?;
        }
        self.suspended.store(false, Ordering::SeqCst);

        self.rx
            .recv()
            .await
            .ok_or_else(|| Error::Capture("keyword listener stopped".to_string()))
    }

    fn clear(&mut self) {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        self.suspended.store(true, Ordering::SeqCst);
        tracing::debug!(dropped, "keyword queue cleared");
    }
}

impl Drop for KeywordListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

struct Worker {
    keywords: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    runtime: Handle,
    tx: mpsc::UnboundedSender<String>,
    suspended: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        if let Err(e) = self.listen() {
            tracing::error!(error = %e, "keyword listener failed");
        }
    }

    fn listen(&self) -> Result<()> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;

        let sample_rate = capture.sample_rate();
        let mut spotter = KeywordSpotter::new(self.keywords.clone(), sample_rate);
        tracing::info!(keywords = ?spotter.keywords(), "listening for keywords");

        while !self.shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(POLL_INTERVAL);

            let samples = capture.take_buffer();
            if !spotter.process(&samples) {
                continue;
            }

            let utterance = spotter.take_utterance();
            if self.suspended.load(Ordering::SeqCst) {
                continue;
            }

            let wav = samples_to_wav(&utterance, sample_rate)?;
            let transcript = match self.runtime.block_on(self.transcriber.transcribe(&wav)) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "keyword transcription failed");
                    continue;
                }
            };

            let words = spotter.spot(&transcript);
            tracing::debug!(transcript = %transcript, words = ?words, "utterance heard");

            for word in words {
                if self.suspended.load(Ordering::SeqCst) {
                    break;
                }
                if self.tx.send(word).is_err() {
                    return Ok(());
                }
            }
        }

        capture.stop();
        Ok(())
    }
}
