//! External enrichment providers: content fetchers, summarizers and embedders.
//!
//! Each provider is a stateless blocking call. Errors are returned as
//! `anyhow` errors; the pipeline decides which ones are fatal for an item.

pub mod anthropic;
pub mod jina;
pub mod openai;
pub mod plain;

use std::time::Duration;

use anyhow::{anyhow, bail};

pub const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Built-in summarization prompt. `{content}` is replaced with the page text.
pub const SUMMARY_PROMPT: &str = "Analyze this content and provide:
1. A concise 1-2 sentence summary of what this is about
2. 3-5 relevant keywords separated by commas

Format your response exactly as:
SUMMARY: <your summary>
KEYWORDS: <keyword1>, <keyword2>, <keyword3>

Content:
{content}";

/// Downloads readable text for a URL.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryResult {
    pub summary: String,
    /// Comma-separated keywords
    pub keywords: String,
    /// Unparsed model output, kept for debugging
    pub raw_response: String,
}

/// Produces a short summary and keyword list for a piece of content.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, content: &str) -> anyhow::Result<SummaryResult>;

    fn name(&self) -> &str;
}

/// Turns text into a fixed-width vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn name(&self) -> &str;
}

/// Fill the prompt template with the content to summarize.
pub fn build_prompt(template: &str, content: &str) -> String {
    template.replace("{content}", content)
}

/// Extract `SUMMARY:` and `KEYWORDS:` lines from a model response.
///
/// Labels are matched case-insensitively. A response without a summary is an error.
pub fn parse_summary_response(response: &str) -> anyhow::Result<SummaryResult> {
    let mut result = SummaryResult {
        raw_response: response.to_string(),
        ..Default::default()
    };

    for line in response.lines() {
        let line = line.trim().trim_start_matches(['*', '#', '-', ' ']);
        if let Some(value) = strip_label(line, "summary:") {
            result.summary = value.trim_matches('*').trim().to_string();
        } else if let Some(value) = strip_label(line, "keywords:") {
            result.keywords = value.trim_matches('*').trim().to_string();
        }
    }

    if result.summary.is_empty() {
        bail!("summarizer response has no SUMMARY line");
    }

    Ok(result)
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        line.get(label.len()..)
    } else {
        None
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Blocking HTTP client shared by the providers.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT_DEFAULT)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| anyhow!("failed to build http client: {e}"))
}

/// API key from `env_var`, falling back to the configured value.
pub fn resolve_api_key(env_var: &str, configured: Option<&str>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            configured
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        })
}

/// Read the body of a failed response for the error message.
pub(crate) fn error_body(resp: reqwest::blocking::Response) -> String {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    format!("{status}: {}", truncate_chars(body.trim(), 500))
}
