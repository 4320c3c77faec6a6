use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{InsightGenerator, InsightTask};
use crate::error::{BidlensError, Result};

pub const DEFAULT_INSIGHT_URL: &str = "http://localhost:11434";
pub const DEFAULT_INSIGHT_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You are an analyst for an equipment auction marketplace. \
Ground every statement in the supplied data and keep the answer concise.";
const ERROR_BODY_EXCERPT_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INSIGHT_URL.to_string(),
            model: DEFAULT_INSIGHT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints (Ollama, LM Studio, ...).
#[derive(Debug, Clone)]
pub struct ChatCompletionsGenerator {
    client: reqwest::blocking::Client,
    config: InsightConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(config: InsightConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| {
                BidlensError::insight_failure(format!("failed to build http client: {error}"))
            })?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl InsightGenerator for ChatCompletionsGenerator {
    fn generate(&self, task: &InsightTask) -> Result<String> {
        let prompt = task.render_prompt();
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        tracing::debug!(
            task = task.name,
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "requesting insight"
        );
        let response = request.send().map_err(|error| {
            BidlensError::insight_failure(format!("request to {} failed: {error}", self.endpoint()))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BidlensError::insight_failure(format!(
                "endpoint returned {status}: {}",
                excerpt(&body)
            )));
        }

        let parsed = response.json::<ChatCompletionResponse>().map_err(|error| {
            BidlensError::insight_failure(format!("malformed completion response: {error}"))
        })?;
        extract_completion_text(parsed)
    }
}

pub fn extract_completion_text(response: ChatCompletionResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| BidlensError::insight_failure("completion response has no message content"))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(BidlensError::insight_failure(
            "completion response content is empty",
        ));
    }
    Ok(trimmed.to_string())
}

fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let prefix = chars.by_ref().take(ERROR_BODY_EXCERPT_CHARS).collect::<String>();
    if chars.next().is_some() {
        format!("{prefix}...")
    } else {
        prefix
    }
}
