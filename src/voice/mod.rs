//! Voice I/O collaborators
//!
//! Microphone capture, keyword listening, recording, playback with cues,
//! and the hosted speech services behind the [`Transcriber`] and
//! [`Synthesizer`] traits.

mod capture;
pub mod listener;
pub mod playback;
pub mod recorder;
pub mod stt;
pub mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav, wav_to_samples, write_wav};
pub use listener::{KeywordListener, WordSource};
pub use playback::{AudioPlayback, Cue, Player, decode_audio, resample};
pub use recorder::{AudioRecorder, DEFAULT_RECORDING_FILE, Recorder};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{Synthesizer, TextToSpeech};
pub use wake_word::{DEFAULT_KEYWORDS, KeywordSpotter, SpotterState};
