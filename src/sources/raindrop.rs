use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{keep_addressable, CommandRunner, SourceAdapter, Watermark};
use crate::bookmarks::{BookmarkCreate, Source};
use crate::store::Store;

const PROGRAM: &str = "raindrop";
const PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct Raindrop {
    #[serde(rename = "_id", default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RaindropPage {
    Bare(Vec<Raindrop>),
    Wrapped { items: Vec<Raindrop> },
}

/// Raindrop.io bookmarks through the `raindrop` CLI.
pub struct RaindropSource {
    store: Arc<Store>,
    runner: Arc<dyn CommandRunner>,
}

impl RaindropSource {
    pub fn new(store: Arc<Store>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { store, runner }
    }

    fn fetch_page(&self, page: usize) -> anyhow::Result<Vec<Raindrop>> {
        let args = vec![
            "list".to_string(),
            "--json".to_string(),
            "--limit".to_string(),
            PER_PAGE.to_string(),
            "--page".to_string(),
            page.to_string(),
        ];
        let output = self.runner.run(PROGRAM, &args)?;
        parse_raindrops(&output)
    }
}

impl SourceAdapter for RaindropSource {
    fn kind(&self) -> Source {
        Source::Raindrop
    }

    fn available(&self) -> bool {
        self.runner.exists(PROGRAM)
    }

    fn fetch(&self, incremental: bool) -> anyhow::Result<Vec<BookmarkCreate>> {
        let mut watermark = Watermark::load(&self.store, Source::Raindrop, incremental)?;
        let mut items = vec![];
        let mut page = 0;

        'pages: loop {
            let raindrops = match self.fetch_page(page) {
                Ok(raindrops) => raindrops,
                Err(err) if page == 0 => return Err(err),
                Err(err) => {
                    log::warn!("raindrop: stopping at page {page}: {err:#}");
                    break;
                }
            };

            if raindrops.is_empty() {
                break;
            }

            let page_len = raindrops.len();
            for raindrop in raindrops {
                let created = raindrop.created.as_deref().and_then(parse_time);
                if let Some(ts) = created {
                    if !watermark.observe(ts) {
                        break 'pages;
                    }
                }
                items.push(to_bookmark(raindrop, created));
            }

            if page_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        watermark.commit(&self.store)?;
        log::debug!("raindrop: fetched {} bookmark(s)", items.len());
        Ok(keep_addressable(Source::Raindrop, items))
    }
}

fn to_bookmark(raindrop: Raindrop, created: Option<DateTime<Utc>>) -> BookmarkCreate {
    BookmarkCreate {
        title: raindrop.title,
        summary: raindrop.excerpt,
        keywords: raindrop.tags.join(","),
        notes: raindrop.note,
        created_at: created,
        ..BookmarkCreate::new(Source::Raindrop, raindrop.link)
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

/// Parse `raindrop list --json` output, either a bare array or `{ "items": [...] }`.
pub fn parse_raindrops(output: &[u8]) -> anyhow::Result<Vec<Raindrop>> {
    let page: RaindropPage = serde_json::from_slice(output)
        .map_err(|e| anyhow!("failed to parse raindrop output: {e}"))?;
    Ok(match page {
        RaindropPage::Bare(items) => items,
        RaindropPage::Wrapped { items } => items,
    })
}
