//! Keyword spotting
//!
//! Local energy detection cuts the microphone stream into utterances; each
//! utterance is transcribed and scanned for the configured keywords.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length in seconds
const MIN_SPEECH_SECS: f32 = 0.3;

/// Trailing silence in seconds that ends an utterance
const SILENCE_SECS: f32 = 0.5;

/// Words listened for by default, in rule order
pub const DEFAULT_KEYWORDS: &[&str] = &["computer", "snapshot", "reply"];

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotterState {
    /// Waiting for speech
    Idle,
    /// Accumulating an utterance
    Listening,
}

/// Splits audio into utterances and finds keywords in their transcripts
pub struct KeywordSpotter {
    keywords: Vec<String>,
    state: SpotterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    min_speech_samples: usize,
    silence_samples: usize,
}

impl KeywordSpotter {
    /// Create a spotter for `keywords` over audio at `sample_rate`
    #[must_use]
    pub fn new(keywords: Vec<String>, sample_rate: u32) -> Self {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(keywords = ?keywords, sample_rate, "keyword spotter initialized");

        Self {
            keywords,
            state: SpotterState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            min_speech_samples: seconds_to_samples(MIN_SPEECH_SECS, sample_rate),
            silence_samples: seconds_to_samples(SILENCE_SECS, sample_rate),
        }
    }

    /// Feed samples; returns `true` once an utterance is complete
    ///
    /// Take the utterance with [`Self::take_utterance`].
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SpotterState::Idle => {
                if is_speech {
                    self.state = SpotterState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
                false
            }
            SpotterState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > self.silence_samples
                    && self.speech_buffer.len() > self.min_speech_samples
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }

                // Too much silence without enough speech
                if self.silence_counter > self.silence_samples * 2 {
                    self.reset();
                }
                false
            }
        }
    }

    /// Take the completed utterance and go back to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.speech_buffer);
        self.reset();
        utterance
    }

    /// Keywords found in `transcript`, in the order they were spoken
    ///
    /// Matching is case-insensitive and ignores punctuation.
    #[must_use]
    pub fn spot(&self, transcript: &str) -> Vec<String> {
        transcript
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| self.keywords.iter().any(|k| k == word))
            .collect()
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SpotterState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SpotterState {
        self.state
    }

    /// Configured keywords
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn seconds_to_samples(secs: f32, sample_rate: u32) -> usize {
    (secs * sample_rate as f32) as usize
}

/// RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
