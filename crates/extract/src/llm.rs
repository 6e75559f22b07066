//! OpenAI-compatible chat completion gateway.
//!
//! Works against any endpoint that speaks `POST {base}/chat/completions`
//! with bearer auth, which covers Groq, OpenAI, and local gateways alike.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retry::RetryPolicy;

/// Model answers are requested deterministic; sampling noise only hurts
/// extraction and query generation.
const TEMPERATURE: f32 = 0.0;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The request never produced an HTTP response (DNS, TLS, timeout).
    #[error("completion request failed: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("completion service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    /// A well-formed response that carries no usable text.
    #[error("completion response carried no content")]
    Empty,
}

impl LlmError {
    /// Transport failures and throttling/server statuses are worth retrying;
    /// everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Empty => false,
        }
    }
}

/// Seam between the pipeline and the completion service. Implemented by
/// [`CompletionClient`] in production and by scripted fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Completions: Send + Sync {
    /// Free-text completion from a system instruction and user content.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Completion constrained to a single JSON object.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct CompletionClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            client,
            retry,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reachability probe for health reporting. Any HTTP response counts as
    /// reachable; only transport failures are errors.
    pub async fn ping(&self) -> Result<(), LlmError> {
        self.client
            .get(format!("{}/models", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn request(&self, system: &str, user: &str, json_mode: bool) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
            temperature: TEMPERATURE,
            response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };
        self.retry
            .retry("chat completion", LlmError::is_retryable, || {
                self.attempt(&url, &body)
            })
            .await
    }

    async fn attempt(&self, url: &str, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("invalid response body: {e}")))?;
        debug!(model = %self.model, "chat completion succeeded");
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::Empty)
    }
}

impl Completions for CompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.request(system, user, false).await
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.request(system, user, true).await
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        assert!(LlmError::Transport("timeout".into()).is_retryable());
        assert!(LlmError::Api { status: 429, message: String::new() }.is_retryable());
        assert!(LlmError::Api { status: 503, message: String::new() }.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!LlmError::Api { status: 401, message: String::new() }.is_retryable());
        assert!(!LlmError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!LlmError::Empty.is_retryable());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 500), "short");
        let long = "é".repeat(300);
        let cut = truncate(&long, 5);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 8);
    }
}
