//! TOML configuration file loading
//!
//! Supports `~/.config/heddy/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{SttBackend, TtsBackend};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct HeddyConfigFile {
    /// API keys for hosted services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Assistant backend
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Camera configuration
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Tool side-effects
    #[serde(default)]
    pub tools: ToolsFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub assemblyai: Option<String>,
}

/// Assistant backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Hosted assistant identifier
    pub id: Option<String>,

    /// API root (e.g. "https://api.openai.com/v1")
    pub base_url: Option<String>,

    /// Model used to describe snapshots
    pub vision_model: Option<String>,

    /// Seconds of inactivity before the thread is discarded
    pub idle_timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Speech-to-text backend
    pub transcriber: Option<SttBackend>,

    /// Whisper model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Speech synthesis backend
    pub tts_provider: Option<TtsBackend>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,

    /// TTS model
    pub tts_model: Option<String>,

    /// Keywords to listen for
    pub keywords: Option<Vec<String>>,

    /// Where recordings are written
    pub recording_path: Option<String>,

    /// Directory holding cue WAV files
    pub sounds_dir: Option<String>,

    /// Text spoken at startup
    pub greeting: Option<String>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    pub device: Option<String>,
    pub resolution: Option<String>,
}

/// Tool configuration
#[derive(Debug, Default, Deserialize)]
pub struct ToolsFileConfig {
    /// Zapier catch hook for `send_text_message`
    pub zapier_webhook_url: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `HeddyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> HeddyConfigFile {
    config_file_path().map_or_else(HeddyConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file, falling back to defaults
pub fn load_from(path: &Path) -> HeddyConfigFile {
    if !path.exists() {
        return HeddyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                HeddyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            HeddyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/heddy/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("heddy").join("config.toml"))
}
