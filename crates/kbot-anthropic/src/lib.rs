//! Anthropic adapter (answer generation).
//!
//! Uses the Messages endpoint: the fixed system prompt plus one user turn that
//! carries the knowledge document and the question.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kbot_core::{
    config::Config,
    errors::Error,
    model::{
        client::AnswerGenerator,
        prompt::{build_user_prompt, SYSTEM_PROMPT},
    },
    Result,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// HTTP-level bound; the router applies its own, usually equal, timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let api_key = cfg
            .claude_api_key
            .clone()
            .ok_or_else(|| Error::Config("CLAUDE_KEY is required".to_string()))?;
        Ok(Self {
            api_key,
            api_url: cfg.claude_api_url.clone(),
            model: cfg.claude_model.clone(),
            max_tokens: cfg.claude_max_tokens,
            temperature: cfg.claude_temperature,
            timeout: cfg.generator_timeout,
        })
    }
}

#[derive(Clone, Debug)]
pub struct AnthropicClient {
    cfg: AnthropicConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(cfg: AnthropicConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent("kbot/0.1")
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn request_body<'a>(&'a self, question: &str, context: &str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.cfg.model,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: build_user_prompt(context, question),
            }],
        }
    }
}

/// Concatenate the `text` blocks of a Messages response body.
fn extract_text(body: &str) -> Result<String> {
    let resp: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| Error::Generator(format!("malformed response: {e}")))?;

    let text = resp
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(Error::Generator("response contained no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl AnswerGenerator for AnthropicClient {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let body = self.request_body(question, context);
        tracing::debug!(
            model = %self.cfg.model,
            prompt_chars = body.messages[0].content.len(),
            "sending messages request"
        );

        let resp = self
            .http
            .post(&self.cfg.api_url)
            .header("x-api-key", &self.cfg.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.cfg.timeout)
                } else {
                    Error::Generator(format!("request error: {e}"))
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Generator(format!("body read error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Generator(format!(
                "anthropic request failed: {status} {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        extract_text(&text)
    }
}
