use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IntakeError;

/// Language model collaborator: one prompt in, one text completion out.
#[async_trait]
pub trait Nlu: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, IntakeError>;
}

const SYSTEM_PROMPT: &str = "You are a friendly and professional hotel assistant.";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::ExternalServiceError(format!("nlu client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(super) fn external(what: &'static str, e: reqwest::Error) -> IntakeError {
    if e.is_timeout() {
        IntakeError::Timeout(what)
    } else {
        IntakeError::ExternalServiceError(format!("{what}: {e}"))
    }
}

#[async_trait]
impl Nlu for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, IntakeError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 1024,
        };
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("nlu request to {} ({} prompt bytes)", self.model, prompt.len());
        let response = request.send().await.map_err(|e| external("nlu", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::ExternalServiceError(format!("nlu returned {status}")));
        }
        let parsed: ChatResponse = response.json().await.map_err(|e| external("nlu", e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| IntakeError::ExternalServiceError("nlu returned no content".into()))
    }
}
