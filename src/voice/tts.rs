//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use crate::{Error, Result};

/// Default ElevenLabs voice
pub const DEFAULT_ELEVENLABS_VOICE: &str = "RXZFrCz94YM9cSj7aieu";
/// Default ElevenLabs model
pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_turbo_v2";
/// Default `OpenAI` voice
pub const DEFAULT_OPENAI_VOICE: &str = "alloy";
/// Default `OpenAI` model
pub const DEFAULT_OPENAI_MODEL: &str = "tts-1";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Turns reply text into encoded audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

/// Hosted speech synthesis client
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    model: String,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            model,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Point the client at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        read_audio(response, "OpenAI").await
    }

    /// Synthesize using the ElevenLabs streaming endpoint
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct VoiceSettings {
            similarity_boost: f32,
            stability: f32,
            style: f32,
            use_speaker_boost: bool,
        }

        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: VoiceSettings {
                similarity_boost: 1.0,
                stability: 1.0,
                style: 1.0,
                use_speaker_boost: true,
            },
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}/stream", self.base_url, self.voice))
            .query(&[("optimize_streaming_latency", "0"), ("output_format", "mp3_44100_128")])
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        read_audio(response, "ElevenLabs").await
    }
}

async fn read_audio(response: reqwest::Response, provider: &str) -> Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, provider, "TTS API error");
        return Err(Error::Tts(format!("{provider} TTS error {status}: {body}")));
    }

    let audio = response
        .bytes()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    tracing::debug!(bytes = audio.len(), provider, "speech synthesized");
    Ok(audio.to_vec())
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }
}
