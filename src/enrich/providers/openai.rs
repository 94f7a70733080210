//! OpenAI-compatible chat completions and embeddings.
//!
//! OpenRouter, Cerebras and Z.ai speak the same chat protocol, so one
//! summarizer serves all of them with a different base URL and key.

use std::time::Duration;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use super::{
    build_prompt, error_body, http_client, parse_summary_response, truncate_chars, Embedder,
    SummaryResult, Summarizer,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const MAX_TOKENS: u32 = 2000;
/// Embedding input cap, roughly the 8k token window of the embedding models.
const MAX_EMBED_CHARS: usize = 30_000;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Summarizer for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiSummarizer {
    client: reqwest::blocking::Client,
    provider: String,
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
    debug: bool,
}

impl OpenAiSummarizer {
    pub fn new(
        provider: &str,
        api_key: String,
        base_url: String,
        model: String,
        prompt: String,
        timeout: Duration,
        debug: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            provider: provider.to_string(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            prompt,
            debug,
        })
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, content: &str) -> anyhow::Result<SummaryResult> {
        let prompt = build_prompt(&self.prompt, content);
        if self.debug {
            log::debug!(
                "sending request to {} ({}) with model {} ({} prompt chars)",
                self.provider,
                self.base_url,
                self.model,
                prompt.len()
            );
        }

        let request = ChatRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| anyhow!("{} request failed: {e}", self.provider))?;

        if !resp.status().is_success() {
            bail!("{} returned {}", self.provider, error_body(resp));
        }

        let body: ChatResponse = resp
            .json()
            .map_err(|e| anyhow!("failed to parse {} response: {e}", self.provider))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("empty response from {}", self.provider))?;

        if self.debug {
            log::debug!("{} response content: {text:?}", self.provider);
        }

        parse_summary_response(&text)
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

/// Embedder backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let input = truncate_chars(text, MAX_EMBED_CHARS);
        log::debug!("openai embedding request for {} chars", input.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![input],
        };

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| anyhow!("openai embeddings request failed: {e}"))?;

        if !resp.status().is_success() {
            bail!("openai embeddings returned {}", error_body(resp));
        }

        let body: EmbeddingResponse = resp
            .json()
            .map_err(|e| anyhow!("failed to parse openai embeddings response: {e}"))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("no embeddings returned"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
