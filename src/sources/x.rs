use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{keep_addressable, CommandRunner, SourceAdapter, Watermark};
use crate::bookmarks::{BookmarkCreate, ScrapeStatus, Source};
use crate::store::Store;

const PROGRAM: &str = "bird";
const TWEET_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct Tweet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub author: Author,
}

#[derive(Debug, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default)]
pub struct TweetPage {
    pub tweets: Vec<Tweet>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BirdOutput {
    Paged {
        tweets: Vec<Tweet>,
        #[serde(rename = "nextCursor", default)]
        next_cursor: Option<String>,
    },
    Bare(Vec<Tweet>),
}

/// X bookmarks through the `bird` CLI.
pub struct XSource {
    store: Arc<Store>,
    runner: Arc<dyn CommandRunner>,
}

impl XSource {
    pub fn new(store: Arc<Store>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { store, runner }
    }

    fn fetch_page(&self, cursor: Option<&str>) -> anyhow::Result<TweetPage> {
        let mut args = vec![
            "bookmarks".to_string(),
            "--all".to_string(),
            "--max-pages".to_string(),
            "1".to_string(),
            "--json".to_string(),
        ];
        if let Some(cursor) = cursor {
            args.push("--cursor".to_string());
            args.push(cursor.to_string());
        }
        let output = self.runner.run(PROGRAM, &args)?;
        parse_tweets(&output)
    }
}

impl SourceAdapter for XSource {
    fn kind(&self) -> Source {
        Source::X
    }

    fn available(&self) -> bool {
        self.runner.exists(PROGRAM)
    }

    fn fetch(&self, incremental: bool) -> anyhow::Result<Vec<BookmarkCreate>> {
        let mut watermark = Watermark::load(&self.store, Source::X, incremental)?;
        let mut items = vec![];
        let mut cursor: Option<String> = None;
        let mut first_page = true;

        'pages: loop {
            let page = match self.fetch_page(cursor.as_deref()) {
                Ok(page) => page,
                Err(err) if first_page => return Err(err),
                Err(err) => {
                    log::warn!("x: stopping pagination: {err:#}");
                    break;
                }
            };
            first_page = false;

            if page.tweets.is_empty() {
                break;
            }

            for tweet in page.tweets {
                let created = tweet.created_at.as_deref().and_then(parse_time);
                if let Some(ts) = created {
                    if !watermark.observe(ts) {
                        break 'pages;
                    }
                }
                if let Some(item) = to_bookmark(tweet, created) {
                    items.push(item);
                }
            }

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        watermark.commit(&self.store)?;
        log::debug!("x: fetched {} bookmark(s)", items.len());
        Ok(keep_addressable(Source::X, items))
    }
}

/// Tweets already carry their full text, so they arrive enriched with content.
fn to_bookmark(tweet: Tweet, created: Option<DateTime<Utc>>) -> Option<BookmarkCreate> {
    if tweet.id.is_empty() || tweet.author.username.is_empty() {
        log::warn!("x: skipping tweet without id or author");
        return None;
    }

    let url = format!("https://x.com/{}/status/{}", tweet.author.username, tweet.id);
    Some(BookmarkCreate {
        title: tweet_title(&tweet.text),
        raw_content: tweet.text,
        created_at: created,
        scrape_status: Some(ScrapeStatus::Success),
        ..BookmarkCreate::new(Source::X, url)
    })
}

fn tweet_title(text: &str) -> String {
    if text.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = text.chars().take(MAX_TITLE_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, TWEET_TIME_FORMAT)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

/// Parse `bird bookmarks --json` output, paged `{ tweets, nextCursor }` or a bare array.
pub fn parse_tweets(output: &[u8]) -> anyhow::Result<TweetPage> {
    let parsed: BirdOutput =
        serde_json::from_slice(output).map_err(|e| anyhow!("failed to parse bird output: {e}"))?;
    Ok(match parsed {
        BirdOutput::Paged {
            tweets,
            next_cursor,
        } => TweetPage {
            tweets,
            next_cursor,
        },
        BirdOutput::Bare(tweets) => TweetPage {
            tweets,
            next_cursor: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "tweets": [
            {"id": "1790000000000000001", "text": "Ownership finally clicked", "createdAt": "Wed May 15 09:30:00 +0000 2024",
             "author": {"username": "ferris", "name": "Ferris"}}
        ],
        "nextCursor": "abc"
    }"#;

    #[test]
    fn test_parse_paged_output() {
        let page = parse_tweets(PAGE.as_bytes()).unwrap();
        assert_eq!(page.tweets.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_bare_array() {
        let page = parse_tweets(br#"[{"id": "1", "text": "hi", "author": {"username": "a"}}]"#).unwrap();
        assert_eq!(page.tweets.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_tweet_time_format() {
        let ts = parse_time("Wed May 15 09:30:00 +0200 2024").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-15T07:30:00+00:00");
    }

    #[test]
    fn test_tweet_maps_to_bookmark() {
        let tweet = parse_tweets(PAGE.as_bytes()).unwrap().tweets.remove(0);
        let item = to_bookmark(tweet, None).unwrap();

        assert_eq!(item.url, "https://x.com/ferris/status/1790000000000000001");
        assert_eq!(item.title, "Ownership finally clicked");
        assert_eq!(item.raw_content, "Ownership finally clicked");
        assert_eq!(item.scrape_status, Some(ScrapeStatus::Success));
    }

    #[test]
    fn test_long_tweet_title_is_truncated() {
        let text = "a".repeat(150);
        let title = tweet_title(&text);
        assert_eq!(title.len(), 103);
        assert!(title.ends_with("..."));
    }
}
