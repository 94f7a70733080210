use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{keep_addressable, CommandRunner, SourceAdapter, Watermark};
use crate::bookmarks::{BookmarkCreate, Source};
use crate::store::Store;

const PROGRAM: &str = "gh";
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct Star {
    #[serde(default)]
    pub starred_at: Option<String>,
    pub repo: Repo,
}

#[derive(Debug, Deserialize)]
pub struct Repo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Starred repositories through the GitHub CLI.
pub struct GithubSource {
    store: Arc<Store>,
    runner: Arc<dyn CommandRunner>,
}

impl GithubSource {
    pub fn new(store: Arc<Store>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { store, runner }
    }

    fn fetch_page(&self, page: usize) -> anyhow::Result<Vec<Star>> {
        let args = vec![
            "api".to_string(),
            format!("user/starred?sort=created&direction=desc&per_page={PER_PAGE}&page={page}"),
            "-H".to_string(),
            "Accept: application/vnd.github.star+json".to_string(),
        ];
        let output = self.runner.run(PROGRAM, &args)?;
        parse_stars(&output)
    }
}

impl SourceAdapter for GithubSource {
    fn kind(&self) -> Source {
        Source::Github
    }

    fn available(&self) -> bool {
        self.runner.exists(PROGRAM)
    }

    fn fetch(&self, incremental: bool) -> anyhow::Result<Vec<BookmarkCreate>> {
        let mut watermark = Watermark::load(&self.store, Source::Github, incremental)?;
        let mut items = vec![];
        let mut page = 1;

        'pages: loop {
            let stars = match self.fetch_page(page) {
                Ok(stars) => stars,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    log::warn!("github: stopping at page {page}: {err:#}");
                    break;
                }
            };

            let page_len = stars.len();
            for star in stars {
                let starred_at = star.starred_at.as_deref().and_then(parse_time);
                if let Some(ts) = starred_at {
                    if !watermark.observe(ts) {
                        break 'pages;
                    }
                }
                items.push(to_bookmark(star, starred_at));
            }

            if page_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        watermark.commit(&self.store)?;
        log::debug!("github: fetched {} star(s)", items.len());
        Ok(keep_addressable(Source::Github, items))
    }
}

fn to_bookmark(star: Star, starred_at: Option<DateTime<Utc>>) -> BookmarkCreate {
    BookmarkCreate {
        title: star.repo.full_name,
        summary: star.repo.description.unwrap_or_default(),
        created_at: starred_at,
        ..BookmarkCreate::new(Source::Github, star.repo.html_url)
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

/// Parse `gh api` output: one JSON array, or several concatenated ones.
pub fn parse_stars(output: &[u8]) -> anyhow::Result<Vec<Star>> {
    if let Ok(stars) = serde_json::from_slice::<Vec<Star>>(output) {
        return Ok(stars);
    }

    let mut stars = vec![];
    for page in serde_json::Deserializer::from_slice(output).into_iter::<Vec<Star>>() {
        stars.extend(page.map_err(|e| anyhow!("failed to parse gh output: {e}"))?);
    }
    Ok(stars)
}
