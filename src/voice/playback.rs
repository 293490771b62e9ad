//! Audio playback to speakers

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;

use super::capture::wav_to_samples;
use crate::{Error, Result};

/// Short sound effects marking interaction milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Recording began
    StartRecording,
    /// Picture mode armed
    Snapshot,
    /// Recording ended, working on a reply
    Respond,
    /// Conversation thread expired
    IdleReset,
    /// Listening for keywords
    Listening,
}

impl Cue {
    /// WAV file name inside the sounds directory
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::StartRecording => "startrecording.wav",
            Self::Snapshot => "tricorder.wav",
            Self::Respond => "respond.wav",
            Self::IdleReset => "timerreset.wav",
            Self::Listening => "listening.wav",
        }
    }
}

/// Plays replies and cues
#[async_trait]
pub trait Player: Send {
    /// Play encoded audio (MP3 or WAV) to completion
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if decoding or playback fails
    async fn play(&mut self, audio: &[u8]) -> Result<()>;

    /// Start a cue without waiting for it; failures are only logged
    fn play_cue(&mut self, cue: Cue);
}

/// Plays audio on the default output device
pub struct AudioPlayback {
    config: StreamConfig,
    sounds_dir: PathBuf,
}

impl AudioPlayback {
    /// Open the default output device; cues are read from `sounds_dir`
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(sounds_dir: impl Into<PathBuf>) -> Result<Self> {
        let device = default_output()?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            sounds_dir: sounds_dir.into(),
        })
    }

    fn prepare(&self, audio: &[u8]) -> Result<Vec<f32>> {
        let (samples, rate) = decode_audio(audio)?;
        resample(&samples, rate, self.config.sample_rate.0)
    }
}

#[async_trait]
impl Player for AudioPlayback {
    async fn play(&mut self, audio: &[u8]) -> Result<()> {
        let samples = self.prepare(audio)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || play_samples_blocking(&config, &samples))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn play_cue(&mut self, cue: Cue) {
        let path = self.sounds_dir.join(cue.file_name());
        let samples = match std::fs::read(&path)
            .map_err(Error::from)
            .and_then(|wav| self.prepare(&wav))
        {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(cue = ?cue, path = %path.display(), error = %e, "cue unavailable");
                return;
            }
        };

        let config = self.config.clone();
        std::thread::spawn(move || {
            if let Err(e) = play_samples_blocking(&config, &samples) {
                tracing::warn!(cue = ?cue, error = %e, "cue playback failed");
            }
        });
    }
}

fn default_output() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}

/// Play mono samples at the device rate, blocking until done
fn play_samples_blocking(config: &StreamConfig, samples: &[f32]) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let device = default_output()?;
    let channels = usize::from(config.channels.max(1));

    let shared: Arc<[f32]> = Arc::from(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let shared = Arc::clone(&shared);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = shared.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < shared.len() {
                            position.store(pos + 1, Ordering::Relaxed);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (shared.len() as u64 * 1000) / u64::from(config.sample_rate.0.max(1));
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while !finished.load(Ordering::Relaxed) && start.elapsed() < timeout {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = shared.len(), "playback complete");
    Ok(())
}

/// Decode WAV or MP3 bytes into mono samples and their rate
///
/// # Errors
///
/// Returns [`Error::Audio`] if the bytes are neither format
pub fn decode_audio(audio: &[u8]) -> Result<(Vec<f32>, u32)> {
    if audio.starts_with(b"RIFF") {
        wav_to_samples(audio)
    } else {
        decode_mp3(audio)
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(sample_rate);

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("no audio frames decoded".to_string()));
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio with rubato
///
/// # Errors
///
/// Returns [`Error::Audio`] if the resampler rejects the rates
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut output = Vec::new();
    for chunk in samples.chunks(chunk_size) {
        // Pad the tail so it is not dropped
        let mut input: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    Ok(output)
}
