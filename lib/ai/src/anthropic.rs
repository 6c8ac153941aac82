//! Anthropic Messages API backend.

use crate::backend::{LlmBackend, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Claude backend.
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicBackend {
    /// Creates a backend with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Sets the model used when a request names none.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the backend at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request<'a>(&'a self, request: &'a LlmRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.build_request(request);
        debug!(model = body.model, "sending Anthropic request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(&response);
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, retry_after, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;
        parsed.into_response()
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub(crate) fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_response(self) -> Result<LlmResponse, LlmError> {
        let content = self
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "no text content in Anthropic response".to_string(),
            })?;

        Ok(LlmResponse {
            content,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
            model: self.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_uses_request_model_and_system() {
        let backend = AnthropicBackend::new("key");
        let request = LlmRequest::new("Summarize this")
            .with_system("Be brief")
            .with_model("claude-3-opus-20240229")
            .with_temperature(0.5);

        let body = serde_json::to_value(backend.build_request(&request)).expect("serialize");
        assert_eq!(
            body,
            json!({
                "model": "claude-3-opus-20240229",
                "max_tokens": 1024,
                "temperature": 0.5,
                "system": "Be brief",
                "messages": [{"role": "user", "content": "Summarize this"}]
            })
        );
    }

    #[test]
    fn request_body_defaults() {
        let backend = AnthropicBackend::new("key").with_model("claude-x");
        let body = serde_json::to_value(backend.build_request(&LlmRequest::new("hi")))
            .expect("serialize");
        assert_eq!(body["model"], "claude-x");
        assert!(body.get("system").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parses_text_response() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "Looks good."}],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }))
        .expect("deserialize");

        let response = parsed.into_response().expect("response");
        assert_eq!(response.content, "Looks good.");
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn empty_content_is_parse_failure() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "model": "m",
            "content": []
        }))
        .expect("deserialize");
        assert!(matches!(
            parsed.into_response(),
            Err(LlmError::ResponseParseFailed { .. })
        ));
    }
}
