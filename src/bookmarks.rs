use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, hash::Hash, str::FromStr};

use crate::eid::Eid;

/// Where a bookmark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    X,
    Raindrop,
    Github,
    Manual,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::X, Source::Raindrop, Source::Github, Source::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::X => "x",
            Source::Raindrop => "raindrop",
            Source::Github => "github",
            Source::Manual => "manual",
        }
    }

    /// Sources whose items carry an upstream creation time worth sorting by.
    pub fn has_original_timestamp(&self) -> bool {
        !matches!(self, Source::Manual)
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Source::X => "[X]",
            Source::Raindrop => "[R]",
            Source::Github => "[G]",
            Source::Manual => "[M]",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" | "twitter" => Ok(Source::X),
            "raindrop" => Ok(Source::Raindrop),
            "github" | "gh" => Ok(Source::Github),
            "manual" => Ok(Source::Manual),
            other => Err(anyhow::anyhow!(
                "unknown source \"{other}\" (expected one of: x, raindrop, github, manual)"
            )),
        }
    }
}

/// Enrichment lifecycle of a bookmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Pending => "pending",
            ScrapeStatus::Success => "success",
            ScrapeStatus::Failed => "failed",
        }
    }
}

impl Display for ScrapeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "pending" => Ok(ScrapeStatus::Pending),
            "success" => Ok(ScrapeStatus::Success),
            "failed" => Ok(ScrapeStatus::Failed),
            other => Err(anyhow::anyhow!("unknown scrape status \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Eid,
    pub source: Source,
    pub url: String,

    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Comma-joined tag list.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_content: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    pub scrape_status: ScrapeStatus,
    pub hidden: bool,
}

impl Hash for Bookmark {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Bookmark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bookmark {}

/// Ingest shape used by sources and manual additions.
///
/// Empty strings and `None` mean "unknown": on an existing record they
/// leave the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookmarkCreate {
    pub source: Option<Source>,
    pub url: String,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub raw_content: String,

    /// Upstream creation time, when the source knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_status: Option<ScrapeStatus>,
}

impl BookmarkCreate {
    pub fn new(source: Source, url: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Eid {
        Eid::from_url(&self.url)
    }
}

/// Direct user edits. These bypass the enrichment pipeline.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookmarkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl BookmarkUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.keywords.is_none()
            && self.notes.is_none()
            && self.hidden.is_none()
    }
}

/// Text handed to the embedder: title, summary and keywords, space-joined.
pub fn embedding_text(title: &str, summary: &str, keywords: &str) -> String {
    format!("{title} {summary} {keywords}")
}

/// Split a comma-joined keyword list into trimmed, lowercased tags.
pub fn parse_keywords(keywords: &str) -> Vec<String> {
    keywords
        .split(',')
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_str() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
        assert!("mastodon".parse::<Source>().is_err());
    }

    #[test]
    fn test_only_manual_lacks_original_timestamp() {
        assert!(Source::Github.has_original_timestamp());
        assert!(!Source::Manual.has_original_timestamp());
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            parse_keywords("Rust, cli ,,Search"),
            vec!["rust", "cli", "search"]
        );
    }
}
