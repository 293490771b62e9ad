//! Configuration management for Heddy

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::assistant::DEFAULT_IDLE_TIMEOUT;
use crate::assistant::client::{DEFAULT_BASE_URL, DEFAULT_VISION_MODEL};
use crate::vision::{DEFAULT_CAMERA_DEVICE, DEFAULT_CAMERA_RESOLUTION};
use crate::voice::{DEFAULT_KEYWORDS, DEFAULT_RECORDING_FILE};
use crate::{Error, Result};

use self::file::HeddyConfigFile;

/// Spoken at startup unless configured otherwise
pub const DEFAULT_GREETING: &str = "Hello! How can I assist you today?";

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SttBackend {
    /// AssemblyAI hosted transcription
    #[default]
    #[value(name = "assemblyai")]
    AssemblyAi,
    /// `OpenAI` Whisper
    Whisper,
}

impl std::str::FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "assemblyai" => Ok(Self::AssemblyAi),
            "whisper" => Ok(Self::Whisper),
            other => Err(Error::Config(format!("unknown transcriber: {other}"))),
        }
    }
}

/// Speech synthesis backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    /// ElevenLabs streaming synthesis
    #[default]
    ElevenLabs,
    /// `OpenAI` speech
    OpenAi,
}

impl std::str::FromStr for TtsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" => Ok(Self::ElevenLabs),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Heddy configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Assistant backend
    pub assistant: AssistantConfig,

    /// Voice I/O
    pub voice: VoiceConfig,

    /// Camera
    pub camera: CameraConfig,

    /// Zapier webhook for outbound text messages
    pub zapier_webhook_url: Option<String>,

    /// Text spoken at startup
    pub greeting: String,
}

/// API keys for hosted services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub assemblyai: Option<String>,
}

/// Assistant backend configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Hosted assistant identifier
    pub assistant_id: Option<String>,

    /// API root
    pub base_url: String,

    /// Model used to describe snapshots
    pub vision_model: String,

    /// Inactivity before the thread is discarded
    pub idle_timeout: Duration,
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speech-to-text backend
    pub transcriber: SttBackend,

    /// Whisper model
    pub stt_model: String,

    /// Speech synthesis backend
    pub tts_provider: TtsBackend,

    /// Voice override for the selected provider
    pub tts_voice: Option<String>,

    /// Model override for the selected provider
    pub tts_model: Option<String>,

    /// Keywords the listener reports
    pub keywords: Vec<String>,

    /// Where recordings are written
    pub recording_path: PathBuf,

    /// Directory holding cue WAV files
    pub sounds_dir: PathBuf,
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Capture device
    pub device: String,

    /// Capture resolution (WIDTHxHEIGHT)
    pub resolution: String,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// `transcriber` comes from the command line and beats every other layer.
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn load(transcriber: Option<SttBackend>) -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_layers(fc, |key| std::env::var(key).ok(), transcriber)
    }

    /// Merge a parsed config file with values from `env`
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn from_layers(
        fc: HeddyConfigFile,
        env: impl Fn(&str) -> Option<String>,
        transcriber: Option<SttBackend>,
    ) -> Result<Self> {
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            assemblyai: env("ASSEMBLYAI_API_KEY").or(fc.api_keys.assemblyai),
        };

        let idle_secs = env("HEDDY_IDLE_TIMEOUT_SECS")
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .map_err(|e| Error::Config(format!("HEDDY_IDLE_TIMEOUT_SECS: {e}")))
            })
            .transpose()?
            .or(fc.assistant.idle_timeout_secs);

        let assistant = AssistantConfig {
            assistant_id: env("HEDDY_ASSISTANT_ID").or(fc.assistant.id),
            base_url: env("HEDDY_OPENAI_BASE_URL")
                .or(fc.assistant.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            vision_model: env("HEDDY_VISION_MODEL")
                .or(fc.assistant.vision_model)
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            idle_timeout: idle_secs.map_or(DEFAULT_IDLE_TIMEOUT, Duration::from_secs),
        };

        let env_transcriber = env("HEDDY_TRANSCRIBER")
            .map(|s| s.parse::<SttBackend>())
            .transpose()?;
        let env_tts = env("HEDDY_TTS_PROVIDER")
            .map(|s| s.parse::<TtsBackend>())
            .transpose()?;

        let keywords = env("HEDDY_KEYWORDS")
            .map(|s| {
                s.split(',')
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty())
                    .collect::<Vec<_>>()
            })
            .or(fc.voice.keywords)
            .unwrap_or_else(|| DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect());

        let voice = VoiceConfig {
            transcriber: transcriber
                .or(env_transcriber)
                .or(fc.voice.transcriber)
                .unwrap_or_default(),
            stt_model: env("HEDDY_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_provider: env_tts.or(fc.voice.tts_provider).unwrap_or_default(),
            tts_voice: env("HEDDY_TTS_VOICE").or(fc.voice.tts_voice),
            tts_model: env("HEDDY_TTS_MODEL").or(fc.voice.tts_model),
            keywords,
            recording_path: env("HEDDY_RECORDING_PATH")
                .or(fc.voice.recording_path)
                .map_or_else(|| PathBuf::from(DEFAULT_RECORDING_FILE), PathBuf::from),
            sounds_dir: env("HEDDY_SOUNDS_DIR")
                .or(fc.voice.sounds_dir)
                .map_or_else(default_sounds_dir, PathBuf::from),
        };

        let camera = CameraConfig {
            device: env("HEDDY_CAMERA_DEVICE")
                .or(fc.camera.device)
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            resolution: env("HEDDY_CAMERA_RESOLUTION")
                .or(fc.camera.resolution)
                .unwrap_or_else(|| DEFAULT_CAMERA_RESOLUTION.to_string()),
        };

        Ok(Self {
            api_keys,
            assistant,
            voice,
            camera,
            zapier_webhook_url: env("HEDDY_ZAPIER_WEBHOOK_URL").or(fc.tools.zapier_webhook_url),
            greeting: env("HEDDY_GREETING")
                .or(fc.voice.greeting)
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        })
    }

    /// Assistant identifier, required to run the interaction loop
    ///
    /// # Errors
    ///
    /// Returns error if no assistant is configured
    pub fn require_assistant_id(&self) -> Result<&str> {
        self.assistant
            .assistant_id
            .as_deref()
            .ok_or_else(|| Error::Config("HEDDY_ASSISTANT_ID is not set".to_string()))
    }
}

/// Cue sounds live under the user data dir (`~/.local/share/heddy/sounds` on Linux)
fn default_sounds_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("sounds"),
        |d| d.data_dir().join("heddy").join("sounds"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_source() {
        let config = Config::from_layers(HeddyConfigFile::default(), env(&[]), None).unwrap();

        assert_eq!(config.assistant.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.assistant.base_url, "https://api.openai.com/v1");
        assert_eq!(config.voice.transcriber, SttBackend::AssemblyAi);
        assert_eq!(config.voice.tts_provider, TtsBackend::ElevenLabs);
        assert_eq!(config.voice.keywords, ["computer", "snapshot", "reply"]);
        assert_eq!(config.voice.recording_path, PathBuf::from("recorded_audio.wav"));
        assert_eq!(config.camera.device, "/dev/video0");
        assert_eq!(config.greeting, DEFAULT_GREETING);
        assert!(config.require_assistant_id().is_err());
    }

    #[test]
    fn env_beats_file_and_flag_beats_env() {
        let fc: HeddyConfigFile = toml::from_str(
            r#"
            [assistant]
            id = "asst_file"
            idle_timeout_secs = 30

            [voice]
            transcriber = "assemblyai"
            "#,
        )
        .unwrap();

        let config = Config::from_layers(
            fc,
            env(&[
                ("HEDDY_ASSISTANT_ID", "asst_env"),
                ("HEDDY_TRANSCRIBER", "assemblyai"),
                ("HEDDY_KEYWORDS", "computer, reply,,"),
            ]),
            Some(SttBackend::Whisper),
        )
        .unwrap();

        assert_eq!(config.require_assistant_id().unwrap(), "asst_env");
        assert_eq!(config.assistant.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.voice.transcriber, SttBackend::Whisper);
        assert_eq!(config.voice.keywords, ["computer", "reply"]);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let err = Config::from_layers(
            HeddyConfigFile::default(),
            env(&[("HEDDY_IDLE_TIMEOUT_SECS", "soon")]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_layers(
            HeddyConfigFile::default(),
            env(&[("HEDDY_TTS_PROVIDER", "espeak")]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
