//! Enrichment pipeline: content fetch, summarize, embed, persist.
//!
//! Each stage fails independently. Only a failed content fetch stops an item
//! and marks it `failed`; summarizer and embedder errors are logged and the
//! item still ends up `success`, since success means "content was obtained".

pub mod providers;

use std::sync::Arc;

use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::bookmarks::{embedding_text, Bookmark, ScrapeStatus};
use crate::store::{Enrichment, Store, StoreError};
use providers::{truncate_chars, ContentFetcher, Embedder, Summarizer};

/// Longest title derived from page content.
const MAX_DERIVED_TITLE_CHARS: usize = 100;

static TITLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*title\s*:").expect("title label regex is valid")
});

/// Pipeline tuning, passed in at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stored content is capped to this many characters.
    pub max_content_len: usize,
    /// Summarizer input is capped to this many characters.
    pub summary_input_len: usize,
    /// Log raw provider responses.
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_content_len: 50_000,
            summary_input_len: 10_000,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageResult {
    Done,
    Skipped,
    Failed,
}

/// What happened to one bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub fetch: StageResult,
    pub summary: StageResult,
    pub embedding: StageResult,
    /// `false` when the bookmark disappeared before the result could be saved.
    pub persisted: bool,
}

impl ItemOutcome {
    fn fetch_failed() -> Self {
        Self {
            fetch: StageResult::Failed,
            summary: StageResult::Skipped,
            embedding: StageResult::Skipped,
            persisted: true,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.fetch != StageResult::Failed && self.persisted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub summarized: usize,
    pub embedded: usize,
    pub summary_errors: usize,
    pub embedding_errors: usize,
    /// Items deleted while they were being enriched.
    pub vanished: usize,
}

impl PipelineReport {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;

        if !outcome.persisted {
            self.vanished += 1;
        } else if outcome.fetch == StageResult::Failed {
            self.failed += 1;
        } else {
            self.succeeded += 1;
        }

        match outcome.summary {
            StageResult::Done => self.summarized += 1,
            StageResult::Failed => self.summary_errors += 1,
            StageResult::Skipped => {}
        }
        match outcome.embedding {
            StageResult::Done => self.embedded += 1,
            StageResult::Failed => self.embedding_errors += 1,
            StageResult::Skipped => {}
        }
    }
}

pub struct Pipeline {
    store: Arc<Store>,
    fetcher: Arc<dyn ContentFetcher>,
    summarizer: Option<Arc<dyn Summarizer>>,
    embedder: Option<Arc<dyn Embedder>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<dyn ContentFetcher>,
        summarizer: Option<Arc<dyn Summarizer>>,
        embedder: Option<Arc<dyn Embedder>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enrich up to `limit` pending or failed bookmarks, one at a time.
    ///
    /// Provider failures are counted in the report; storage failures abort the batch.
    pub fn run_batch(&self, limit: usize, progress: &ProgressBar) -> Result<PipelineReport, StoreError> {
        let pending = self.store.get_pending(limit)?;
        self.run_items(&pending, progress)
    }

    /// Regenerate summary, keywords and embedding for bookmarks that have
    /// content but no summary.
    pub fn resummarize(
        &self,
        limit: Option<usize>,
        progress: &ProgressBar,
    ) -> Result<PipelineReport, StoreError> {
        let items = self.store.needing_summary(limit)?;
        self.run_items(&items, progress)
    }

    fn run_items(&self, items: &[Bookmark], progress: &ProgressBar) -> Result<PipelineReport, StoreError> {
        let mut report = PipelineReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        log::info!("enriching {} bookmark(s)", items.len());
        progress.set_length(items.len() as u64);

        for bookmark in items {
            progress.set_message(bookmark.url.clone());
            let outcome = self.enrich_one(bookmark)?;
            report.record(&outcome);
            progress.inc(1);
        }

        log::info!(
            "enrichment done: {} succeeded, {} failed, {} summarized, {} embedded",
            report.succeeded,
            report.failed,
            report.summarized,
            report.embedded
        );
        Ok(report)
    }

    /// Run every stage for one bookmark and persist the result once.
    pub fn enrich_one(&self, bookmark: &Bookmark) -> Result<ItemOutcome, StoreError> {
        let id = bookmark.id.as_str();

        let (content, fetch) = if bookmark.raw_content.is_empty() {
            match self.fetcher.fetch(&bookmark.url) {
                Ok(text) => (
                    truncate_chars(&text, self.config.max_content_len).to_string(),
                    StageResult::Done,
                ),
                Err(err) => {
                    log::warn!("{}: content fetch failed: {err:#}", bookmark.url);
                    let marked = self.store.mark_failed(id)?;
                    return Ok(ItemOutcome {
                        persisted: marked || self.exists(id)?,
                        ..ItemOutcome::fetch_failed()
                    });
                }
            }
        } else {
            (bookmark.raw_content.clone(), StageResult::Skipped)
        };

        let derived_title = if bookmark.title.trim().is_empty() || bookmark.title == bookmark.url {
            Some(extract_title_from_content(&content, &bookmark.url))
        } else {
            None
        };
        let title = derived_title.as_deref().unwrap_or(&bookmark.title);

        let mut summary = bookmark.summary.clone();
        let mut keywords = bookmark.keywords.clone();
        let mut new_summary = String::new();
        let mut new_keywords = String::new();

        let summary_stage = match (&self.summarizer, bookmark.summary.is_empty()) {
            (Some(summarizer), true) => {
                let input = truncate_chars(&content, self.config.summary_input_len);
                match summarizer.summarize(input) {
                    Ok(result) => {
                        if self.config.debug {
                            log::debug!("{}: raw summary response: {:?}", bookmark.url, result.raw_response);
                        }
                        summary = result.summary.clone();
                        new_summary = result.summary;
                        if bookmark.keywords.is_empty() {
                            keywords = result.keywords.clone();
                            new_keywords = result.keywords;
                        }
                        StageResult::Done
                    }
                    Err(err) => {
                        log::warn!("{}: summarize via {} failed: {err:#}", bookmark.url, summarizer.name());
                        StageResult::Failed
                    }
                }
            }
            (None, true) => {
                log::debug!("{}: no summarizer configured", bookmark.url);
                StageResult::Skipped
            }
            (_, false) => StageResult::Skipped,
        };

        let embedding_stage = match &self.embedder {
            Some(embedder) => {
                let text = embedding_text(title, &summary, &keywords);
                match embedder.embed(&text) {
                    Ok(vector) => {
                        if self.store.update_embedding(id, &vector)? {
                            StageResult::Done
                        } else {
                            StageResult::Skipped
                        }
                    }
                    Err(err) => {
                        log::warn!("{}: embed via {} failed: {err:#}", bookmark.url, embedder.name());
                        StageResult::Failed
                    }
                }
            }
            None => StageResult::Skipped,
        };

        let persisted = self.store.record_enrichment(
            id,
            &Enrichment {
                title: derived_title,
                raw_content: content,
                summary: new_summary,
                keywords: new_keywords,
                status: ScrapeStatus::Success,
            },
        )?;

        if !persisted {
            log::debug!("{}: bookmark was deleted during enrichment", bookmark.url);
        }

        Ok(ItemOutcome {
            fetch,
            summary: summary_stage,
            embedding: embedding_stage,
            persisted,
        })
    }

    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        match self.store.get(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Title from the first line of content, without a leading `Title:` label.
///
/// Falls back to `fallback` when nothing usable remains.
pub fn extract_title_from_content(content: &str, fallback: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    let first_line = truncate_chars(first_line, MAX_DERIVED_TITLE_CHARS);
    let title = TITLE_LABEL.replace(first_line, "");
    let title = title.trim();

    if title.is_empty() {
        fallback.to_string()
    } else {
        title.to_string()
    }
}
