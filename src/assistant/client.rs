//! Hosted assistant backend (threads, streamed runs, vision)

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::stream::{RunStream, decode_run_stream};
use crate::tools::ToolOutput;
use crate::{Error, Result};

/// Default API root for the hosted assistant
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for image descriptions
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Operations the streaming engine needs from the assistant service
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Create a new conversation thread
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects or cannot be reached
    async fn create_thread(&self) -> Result<String>;

    /// Append a user message to a thread
    ///
    /// # Errors
    ///
    /// Returns error if the message is not accepted
    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()>;

    /// Start a streamed run of `assistant_id` over a thread
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened
    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunStream>;

    /// Submit tool outputs to a paused run and stream the continuation
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream>;

    /// Describe a PNG image in response to `prompt`
    ///
    /// # Errors
    ///
    /// Returns error if the vision request fails
    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String>;
}

/// `OpenAI` Assistants API client
pub struct OpenAiAssistant {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    vision_model: String,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Serialize)]
struct SubmitToolOutputsRequest<'a> {
    tool_outputs: &'a [ToolOutput],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiAssistant {
    /// Create a client against the default API root
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for the assistant".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
        })
    }

    /// Point the client at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a different model for image descriptions
    #[must_use]
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, request = what, "assistant request failed");
            Error::Transport(format!("{what}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, request = what, "assistant API error");
            return Err(Error::Assistant(format!("{what} failed with {status}: {body}")));
        }

        Ok(response)
    }

    async fn open_stream(&self, request: reqwest::RequestBuilder, what: &str) -> Result<RunStream> {
        let response = self.send(request, what).await?;
        Ok(decode_run_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistant {
    async fn create_thread(&self) -> Result<String> {
        let response = self.send(self.post("/threads").json(&json!({})), "create thread").await?;
        let thread: ThreadObject = response.json().await?;
        tracing::info!(thread_id = %thread.id, "created assistant thread");
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<()> {
        let request = self
            .post(&format!("/threads/{thread_id}/messages"))
            .json(&json!({ "role": "user", "content": content }));
        self.send(request, "add message").await?;
        tracing::debug!(thread_id, chars = content.len(), "appended user message");
        Ok(())
    }

    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunStream> {
        let request = self
            .post(&format!("/threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": assistant_id, "stream": true }));
        self.open_stream(request, "create run").await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream> {
        tracing::debug!(thread_id, run_id, outputs = outputs.len(), "submitting tool outputs");
        let request = self
            .post(&format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"))
            .json(&SubmitToolOutputsRequest {
                tool_outputs: &outputs,
                stream: true,
            });
        self.open_stream(request, "submit tool outputs").await
    }

    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        let body = json!({
            "model": self.vision_model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{encoded}") }
                    }
                ]
            }]
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let completion: ChatCompletion = self.send(request, "describe image").await?.json().await?;

        let description = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Assistant("vision response had no content".to_string()))?;

        tracing::info!(chars = description.len(), "image described");
        Ok(description)
    }
}
