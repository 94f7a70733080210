use std::time::Duration;

use anyhow::{anyhow, bail};
use reqwest::StatusCode;

use super::{error_body, http_client, ContentFetcher};

const READER_BASE: &str = "https://r.jina.ai/";

/// Fetches page text through the Jina reader service.
pub struct JinaFetcher {
    client: reqwest::blocking::Client,
    base: String,
}

impl JinaFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base: READER_BASE.to_string(),
        })
    }

    pub fn reader_url(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        format!("{}{encoded}", self.base)
    }
}

impl ContentFetcher for JinaFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let reader_url = self.reader_url(url);
        log::debug!("{url}: requesting reader text");

        let resp = self
            .client
            .get(&reader_url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .map_err(|e| anyhow!("{url}: reader request failed: {e}"))?;

        if resp.status() != StatusCode::OK {
            bail!("{url}: reader returned {}", error_body(resp));
        }

        let text = resp
            .text()
            .map_err(|e| anyhow!("{url}: failed to read reader response: {e}"))?;

        if text.trim().is_empty() {
            bail!("{url}: reader returned no content");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "jina"
    }
}
