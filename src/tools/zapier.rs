//! Outbound text messages through a Zapier catch hook

use async_trait::async_trait;
use serde::Serialize;

use crate::{Error, Result};

/// Output reported to the assistant when a message went out
pub const SENT_OUTPUT: &str = "Success!";

/// Sends a text message somewhere outside the conversation
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`
    ///
    /// # Errors
    ///
    /// Returns error if delivery fails
    async fn send(&self, text: &str) -> Result<()>;
}

/// Posts messages to a Zapier webhook
pub struct ZapierWebhook {
    client: reqwest::Client,
    url: Option<String>,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

impl ZapierWebhook {
    /// Create a webhook notifier; `None` leaves the tool unconfigured
    #[must_use]
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for ZapierWebhook {
    async fn send(&self, text: &str) -> Result<()> {
        let Some(url) = &self.url else {
            return Err(Error::Config("no Zapier webhook URL configured".to_string()));
        };

        let response = self
            .client
            .post(url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Tool(format!("webhook failed with {status}")));
        }

        tracing::info!(chars = text.len(), "text message sent");
        Ok(())
    }
}

/// Pull the message out of `send_text_message` arguments
///
/// Arguments are JSON with a `message` field; anything else sends an empty
/// message.
#[must_use]
pub fn message_from_arguments(arguments: &str) -> String {
    serde_json::from_str::<serde_json::Value>(arguments)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(ToString::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extracts_message_field() {
        assert_eq!(message_from_arguments(r#"{"message":"on my way"}"#), "on my way");
        assert_eq!(message_from_arguments(r#"{"text":"ignored"}"#), "");
        assert_eq!(message_from_arguments("not json"), "");
    }

    #[tokio::test]
    async fn posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/catch/1/abc/"))
            .and(body_json(serde_json::json!({"text": "tick"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let hook = ZapierWebhook::new(Some(format!("{}/hooks/catch/1/abc/", server.uri())));
        hook.send("tick").await.unwrap();
    }

    #[tokio::test]
    async fn non_ok_status_is_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let hook = ZapierWebhook::new(Some(server.uri()));
        let err = hook.send("tick").await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[tokio::test]
    async fn missing_url_is_config_error() {
        let hook = ZapierWebhook::new(None);
        assert!(matches!(hook.send("tick").await, Err(Error::Config(_))));
    }
}
