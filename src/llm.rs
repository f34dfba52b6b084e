//! OpenAI-compatible chat completions client

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::LlmConfig;
use crate::error::{UpstreamError, UpstreamFailure};
use crate::{CommuteSenseError, Result, upstream};

const PROVIDER: &str = "LLM";

pub struct ChatClient {
    client: ClientWithMiddleware,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn failed(failure: UpstreamFailure, message: impl Into<String>) -> CommuteSenseError {
    CommuteSenseError::NarrativeGeneration(UpstreamError::new(failure, message))
}

impl ChatClient {
    pub fn new(config: &LlmConfig, max_retries: u32) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| CommuteSenseError::config("Missing LLM API key"))?;
        let client = upstream::build_client(
            Duration::from_secs(u64::from(config.timeout_seconds)),
            max_retries,
        )
        .map_err(|e| CommuteSenseError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Send a single user message and return the trimmed reply
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| failed(UpstreamFailure::InvalidResponse, format!("Failed to encode request: {e}")))?;

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response = upstream::send(PROVIDER, request)
            .await
            .map_err(CommuteSenseError::NarrativeGeneration)?;
        let completion: ChatResponse = upstream::read_json(PROVIDER, response)
            .await
            .map_err(CommuteSenseError::NarrativeGeneration)?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| failed(UpstreamFailure::InvalidResponse, "Completion had no choices"))?
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        let content = content.trim();
        if content.is_empty() {
            return Err(failed(
                UpstreamFailure::EmptyCompletion,
                "Completion content was empty",
            ));
        }

        debug!(reply_chars = content.len(), "Completion received");
        Ok(content.to_string())
    }
}
