//! Records one utterance to a WAV file

use std::path::{Path, PathBuf};

use super::capture::{AudioCapture, write_wav};
use crate::{Error, Result};

/// File the recorder writes when no path is configured
pub const DEFAULT_RECORDING_FILE: &str = "recorded_audio.wav";

/// Start/stop microphone recording
pub trait Recorder {
    /// Begin recording
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the microphone cannot be opened
    fn start(&mut self) -> Result<()>;

    /// End recording and return the file holding the audio
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if nothing was recording or the file cannot
    /// be written
    fn stop(&mut self) -> Result<PathBuf>;
}

/// Microphone recorder writing 16-bit mono WAV
pub struct AudioRecorder {
    capture: Option<AudioCapture>,
    path: PathBuf,
}

impl AudioRecorder {
    /// Create a recorder that writes to `path`
    ///
    /// The device is opened on the first [`Recorder::start`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            capture: None,
            path: path.into(),
        }
    }

    /// Output file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Recorder for AudioRecorder {
    fn start(&mut self) -> Result<()> {
        let capture = match self.capture.take() {
            Some(capture) => capture,
            None => AudioCapture::new()?,
        };
        let capture = self.capture.insert(capture);

        capture.clear_buffer();
        capture.start()?;
        tracing::info!(path = %self.path.display(), "recording started");
        Ok(())
    }

    fn stop(&mut self) -> Result<PathBuf> {
        let capture = self
            .capture
            .as_mut()
            .filter(|c| c.is_capturing())
            .ok_or_else(|| Error::Capture("recorder was not started".to_string()))?;

        capture.stop();
        let samples = capture.take_buffer();

        write_wav(&self.path, &samples, capture.sample_rate())
            .map_err(|e| Error::Capture(e.to_string()))?;

        tracing::info!(
            path = %self.path.display(),
            samples = samples.len(),
            "recording saved"
        );
        Ok(self.path.clone())
    }
}
