//! Speech-to-text (STT) processing

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ASSEMBLYAI_BASE_URL: &str = "https://api.assemblyai.com";

/// Delay between AssemblyAI status polls
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Turns recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transcription`] if the service fails
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Transcribe a WAV file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transcription`] if the file cannot be read or the
    /// service fails
    async fn transcribe_file(&self, path: &Path) -> Result<String> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Transcription(format!("cannot read {}: {e}", path.display())))?;
        self.transcribe(&audio).await
    }
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(serde::Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    text: Option<String>,
    error: Option<String>,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    AssemblyAi,
}

/// Hosted transcription client
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    poll_interval: Duration,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
            poll_interval: POLL_INTERVAL,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using AssemblyAI
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_assemblyai(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("AssemblyAI API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: String::new(),
            base_url: ASSEMBLYAI_BASE_URL.to_string(),
            poll_interval: POLL_INTERVAL,
            provider: SttProvider::AssemblyAi,
        })
    }

    /// Point the client at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Change how often AssemblyAI jobs are polled
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("bad Whisper response: {e}")))?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Upload, submit and poll an AssemblyAI transcript
    async fn transcribe_assemblyai(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting AssemblyAI transcription");

        let upload: UploadResponse = self
            .assemblyai_json(
                self.client
                    .post(format!("{}/v2/upload", self.base_url))
                    .header("Content-Type", "application/octet-stream")
                    .body(audio.to_vec()),
            )
            .await?;

        let mut transcript: TranscriptResponse = self
            .assemblyai_json(
                self.client
                    .post(format!("{}/v2/transcript", self.base_url))
                    .json(&serde_json::json!({ "audio_url": upload.upload_url })),
            )
            .await?;

        loop {
            match transcript.status.as_str() {
                "completed" => {
                    let text = transcript.text.unwrap_or_default();
                    tracing::info!(transcript = %text, "transcription complete");
                    return Ok(text);
                }
                "error" => {
                    let error = transcript
                        .error
                        .unwrap_or_else(|| "unknown AssemblyAI error".to_string());
                    tracing::error!(id = %transcript.id, error = %error, "AssemblyAI job failed");
                    return Err(Error::Transcription(error));
                }
                status => tracing::trace!(id = %transcript.id, status, "waiting for transcript"),
            }

            tokio::time::sleep(self.poll_interval).await;

            transcript = self
                .assemblyai_json(
                    self.client
                        .get(format!("{}/v2/transcript/{}", self.base_url, transcript.id)),
                )
                .await?;
        }
    }

    async fn assemblyai_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "AssemblyAI request failed");
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "AssemblyAI API error");
            return Err(Error::Transcription(format!(
                "AssemblyAI API error {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("bad AssemblyAI response: {e}")))
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::AssemblyAi => self.transcribe_assemblyai(audio).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn empty_keys_are_rejected() {
        assert!(SpeechToText::new_whisper(String::new(), "whisper-1".to_string()).is_err());
        assert!(SpeechToText::new_assemblyai(String::new()).is_err());
    }

    #[tokio::test]
    async fn whisper_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "describe this"
            })))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_whisper("sk-test".to_string(), "whisper-1".to_string())
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(stt.transcribe(b"RIFF").await.unwrap(), "describe this");
    }

    #[tokio::test]
    async fn assemblyai_polls_until_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .and(header("authorization", "aai-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "upload_url": "https://cdn.example/audio"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "t1", "status": "queued", "text": null, "error": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/transcript/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "t1", "status": "completed", "text": "ok computer", "error": null
            })))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_assemblyai("aai-key".to_string())
            .unwrap()
            .with_base_url(server.uri())
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(stt.transcribe(b"RIFF").await.unwrap(), "ok computer");
    }

    #[tokio::test]
    async fn assemblyai_job_error_is_transcription_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "upload_url": "https://cdn.example/audio"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "t2", "status": "error", "text": null, "error": "audio too short"
            })))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_assemblyai("aai-key".to_string())
            .unwrap()
            .with_base_url(server.uri());
        let err = stt.transcribe(b"RIFF").await.unwrap_err();
        assert!(matches!(err, Error::Transcription(m) if m == "audio too short"));
    }

    #[tokio::test]
    async fn missing_file_is_transcription_failure() {
        let stt = SpeechToText::new_assemblyai("aai-key".to_string()).unwrap();
        let err = stt
            .transcribe_file(Path::new("/nonexistent/recorded_audio.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }
}
