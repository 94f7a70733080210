use std::time::Duration;

use anyhow::{anyhow, bail};

use super::{error_body, http_client, ContentFetcher};

/// Fetches a page directly and reduces its HTML to readable text.
pub struct PlainFetcher {
    client: reqwest::blocking::Client,
}

impl PlainFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

impl ContentFetcher for PlainFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let parsed = reqwest::Url::parse(url).map_err(|e| anyhow!("{url}: invalid URL: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("{url}: unsupported scheme {}", parsed.scheme());
        }

        log::debug!("{url}: requesting");
        let resp = self
            .client
            .get(parsed)
            .send()
            .map_err(|e| anyhow!("{url}: request failed: {e}"))?;

        if !resp.status().is_success() {
            bail!("{url}: {}", error_body(resp));
        }

        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);

        let body = resp
            .text()
            .map_err(|e| anyhow!("{url}: failed to read body: {e}"))?;

        let text = if is_html { html_to_text(&body) } else { body };
        if text.trim().is_empty() {
            bail!("{url}: page has no readable text");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "plain"
    }
}

/// Title on the first line, then the visible text of the body, one block per line.
pub fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);

    let mut lines: Vec<String> = vec![];

    if let Ok(title_selector) = scraper::Selector::parse("title") {
        if let Some(title) = document.select(&title_selector).next() {
            let title = collapse_whitespace(&title.text().collect::<String>());
            if !title.is_empty() {
                lines.push(title);
            }
        }
    }

    let Ok(block_selector) =
        scraper::Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td")
    else {
        return lines.join("\n");
    };

    for element in document.select(&block_selector) {
        // the outer block already carries this text
        let nested = element
            .ancestors()
            .filter_map(scraper::ElementRef::wrap)
            .any(|ancestor| block_selector.matches(&ancestor));
        if nested {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            lines.push(text);
        }
    }

    lines.join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
