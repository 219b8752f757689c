// Copyright 2025 Evalset (https://github.com/evalset/evalset)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Completion backend abstraction and HTTP implementations.
//!
//! Every case in a run issues exactly one single-turn completion through
//! [`CompletionBackend`]. Backend errors never abort a run; the executor
//! downgrades them to scored case failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use evalset_core::{ModelSpec, Usage, UsageCost};

/// Output tokens requested per completion.
const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Single-turn completion request issued once per case.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Resolved variant prompt; empty means no system field on the wire.
    pub system_prompt: String,
    /// Case input, sent as one user turn.
    pub input: String,
    pub temperature: Option<f64>,
    pub api_key: Option<String>,
}

/// One block of assistant output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
}

/// Completed response from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub content: Vec<ContentBlock>,
    pub stop_reason: String,
    pub usage: Usage,
}

impl CompletionOutcome {
    /// Text blocks joined by newlines and trimmed. Non-text blocks are
    /// skipped; scoring only ever sees answer text.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Thinking { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Errors from completion backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A model endpoint able to answer single-turn completions.
#[async_trait]
pub trait CompletionBackend: Send + Sync + std::fmt::Debug {
    /// Model served by this backend.
    fn model(&self) -> &ModelSpec;

    /// Issue one completion.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, BackendError>;
}

/// Per-token USD rates for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePerToken {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

impl PricePerToken {
    /// Anthropic cache rates derive from the input rate: reads bill at
    /// 0.1x, writes at 1.25x.
    fn anthropic(input: f64, output: f64) -> Self {
        Self {
            input,
            output,
            cache_read: input * 0.1,
            cache_write: input * 1.25,
        }
    }

    /// OpenAI cached prompt tokens bill at half the input rate; there is
    /// no separate write charge.
    fn openai(input: f64, output: f64) -> Self {
        Self {
            input,
            output,
            cache_read: input * 0.5,
            cache_write: 0.0,
        }
    }

    /// Build a priced usage record from raw token counts.
    fn usage(&self, input: u64, output: u64, cache_read: u64, cache_write: u64) -> Usage {
        let cost_input = input as f64 * self.input;
        let cost_output = output as f64 * self.output;
        let cost_cache_read = cache_read as f64 * self.cache_read;
        let cost_cache_write = cache_write as f64 * self.cache_write;

        Usage {
            input,
            output,
            cache_read,
            cache_write,
            total_tokens: input + output + cache_read + cache_write,
            cost: UsageCost {
                input: cost_input,
                output: cost_output,
                cache_read: cost_cache_read,
                cache_write: cost_cache_write,
                total: cost_input + cost_output + cost_cache_read + cost_cache_write,
            },
        }
    }
}

/// Anthropic Messages API backend.
#[derive(Debug)]
pub struct AnthropicBackend {
    model: ModelSpec,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model: ModelSpec::new("anthropic", model_id, "anthropic-messages"),
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn cost_per_token(&self) -> PricePerToken {
        // Pricing as of 2025
        match self.model.id.as_str() {
            "claude-sonnet-4-5" | "claude-3-5-sonnet-20241022" => {
                PricePerToken::anthropic(0.000003, 0.000015) // $3/$15 per 1M
            }
            "claude-3-5-haiku-20241022" => {
                PricePerToken::anthropic(0.0000008, 0.000004) // $0.80/$4 per 1M
            }
            _ => PricePerToken::anthropic(0.000003, 0.000015), // Default to Sonnet pricing
        }
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn model(&self) -> &ModelSpec {
        &self.model
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, BackendError> {
        let mut body = json!({
            "model": self.model.id,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [
                {
                    "role": "user",
                    "content": request.input
                }
            ],
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let mut http = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json");
        if let Some(api_key) = &request.api_key {
            http = http.header("x-api-key", api_key);
        }

        let response = http.json(&body).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(BackendError::Api(error_text));
        }

        let response_data: Value = response.json().await?;
        parse_anthropic_response(&response_data, self.cost_per_token())
    }
}

fn parse_anthropic_response(
    body: &Value,
    rates: PricePerToken,
) -> Result<CompletionOutcome, BackendError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| BackendError::InvalidResponse("Missing content".to_string()))?;

    let mut content = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => content.push(ContentBlock::Text {
                text: block["text"].as_str().unwrap_or_default().to_string(),
            }),
            Some("thinking") => content.push(ContentBlock::Thinking {
                thinking: block["thinking"].as_str().unwrap_or_default().to_string(),
            }),
            // tool_use and other block kinds carry no answer text
            _ => {}
        }
    }

    let stop_reason = body["stop_reason"].as_str().unwrap_or("unknown").to_string();

    let usage_data = &body["usage"];
    let usage = rates.usage(
        usage_data["input_tokens"].as_u64().unwrap_or(0),
        usage_data["output_tokens"].as_u64().unwrap_or(0),
        usage_data["cache_read_input_tokens"].as_u64().unwrap_or(0),
        usage_data["cache_creation_input_tokens"]
            .as_u64()
            .unwrap_or(0),
    );

    Ok(CompletionOutcome {
        content,
        stop_reason,
        usage,
    })
}

/// OpenAI Chat Completions backend. Works against any OpenAI-compatible
/// endpoint via [`OpenAiBackend::with_base_url`].
#[derive(Debug)]
pub struct OpenAiBackend {
    model: ModelSpec,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model: ModelSpec::new("openai", model_id, "openai-chat"),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn cost_per_token(&self) -> PricePerToken {
        // Pricing as of 2025
        match self.model.id.as_str() {
            "gpt-4o" => PricePerToken::openai(0.0000025, 0.000010), // $2.50/$10 per 1M
            "gpt-4o-mini" => PricePerToken::openai(0.00000015, 0.0000006), // $0.15/$0.60 per 1M
            "gpt-4-turbo" => PricePerToken::openai(0.000010, 0.000030), // $10/$30 per 1M
            _ => PricePerToken::openai(0.00000015, 0.0000006), // Default to mini pricing
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn model(&self) -> &ModelSpec {
        &self.model
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, BackendError> {
        let mut messages = Vec::new();
        if !request.system_prompt.is_empty() {
            messages.push(json!({
                "role": "system",
                "content": request.system_prompt
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": request.input
        }));

        let mut body = json!({
            "model": self.model.id,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &request.api_key {
            http = http.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = http.json(&body).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(BackendError::Api(error_text));
        }

        let response_data: Value = response.json().await?;
        parse_openai_response(&response_data, self.cost_per_token())
    }
}

fn parse_openai_response(
    body: &Value,
    rates: PricePerToken,
) -> Result<CompletionOutcome, BackendError> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| BackendError::InvalidResponse("Missing content".to_string()))?
        .to_string();

    let stop_reason = body["choices"][0]["finish_reason"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    let usage_data = &body["usage"];
    let prompt_tokens = usage_data["prompt_tokens"].as_u64().unwrap_or(0);
    let cached_tokens = usage_data["prompt_tokens_details"]["cached_tokens"]
        .as_u64()
        .unwrap_or(0);

    // prompt_tokens includes the cached portion; split it out so the
    // cached share bills at the cached rate.
    let usage = rates.usage(
        prompt_tokens.saturating_sub(cached_tokens),
        usage_data["completion_tokens"].as_u64().unwrap_or(0),
        cached_tokens,
        0,
    );

    Ok(CompletionOutcome {
        content: vec![ContentBlock::Text { text }],
        stop_reason,
        usage,
    })
}
