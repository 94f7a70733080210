use std::time::Duration;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use super::{build_prompt, error_body, http_client, parse_summary_response, SummaryResult, Summarizer};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Summarizer backed by the Anthropic Messages API.
pub struct AnthropicSummarizer {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
    debug: bool,
}

impl AnthropicSummarizer {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        prompt: String,
        timeout: Duration,
        debug: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            prompt,
            debug,
        })
    }
}

impl Summarizer for AnthropicSummarizer {
    fn summarize(&self, content: &str) -> anyhow::Result<SummaryResult> {
        let prompt = build_prompt(&self.prompt, content);
        if self.debug {
            log::debug!(
                "sending request to anthropic with model {} ({} prompt chars)",
                self.model,
                prompt.len()
            );
        }

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .map_err(|e| anyhow!("anthropic request failed: {e}"))?;

        if !resp.status().is_success() {
            bail!("anthropic returned {}", error_body(resp));
        }

        let body: MessagesResponse = resp
            .json()
            .map_err(|e| anyhow!("failed to parse anthropic response: {e}"))?;

        let text = body
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("empty response from anthropic"))?;

        if self.debug {
            log::debug!("anthropic response text: {text:?}");
        }

        parse_summary_response(&text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
