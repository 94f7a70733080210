use chrono::{DateTime, SecondsFormat, Timelike, Utc};

use crate::bookmarks::Source;
use crate::store::{Store, StoreError};

/// Per-source sync position: the newest item time seen by a previous fetch.
///
/// Item times are compared at whole-second precision, since that is all the
/// stored RFC 3339 value keeps.
#[derive(Debug, Clone)]
pub struct Watermark {
    key: String,
    stored: Option<DateTime<Utc>>,
    cutoff: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn key_for(source: Source) -> String {
        format!("{}_last_sync_ts", source.as_str())
    }

    /// Load the stored watermark. It only acts as a cutoff when `incremental`.
    pub fn load(store: &Store, source: Source, incremental: bool) -> Result<Self, StoreError> {
        let key = Self::key_for(source);
        let raw = store.get_metadata(&key)?;

        let stored = if raw.is_empty() {
            None
        } else {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(err) => {
                    log::warn!("{source}: ignoring unreadable watermark {raw:?}: {err}");
                    None
                }
            }
        };

        Ok(Self {
            key,
            stored,
            cutoff: if incremental { stored } else { None },
            newest: None,
        })
    }

    /// Record an item time. Returns `false` once the item is at or before the cutoff.
    pub fn observe(&mut self, ts: DateTime<Utc>) -> bool {
        let ts = truncate_to_seconds(ts);
        if self.newest.map_or(true, |newest| ts > newest) {
            self.newest = Some(ts);
        }
        self.cutoff.map_or(true, |cutoff| ts > cutoff)
    }

    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.cutoff
    }

    /// Persist the newest observed time if it moves the watermark forward.
    pub fn commit(&self, store: &Store) -> Result<(), StoreError> {
        let Some(newest) = self.newest else {
            return Ok(());
        };
        if self.stored.is_some_and(|stored| newest <= stored) {
            return Ok(());
        }

        log::debug!("{}: advancing to {newest}", self.key);
        store.set_metadata(&self.key, &newest.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, nanos).unwrap()
    }

    #[test]
    fn test_full_fetch_has_no_cutoff() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_metadata("github_last_sync_ts", "2024-01-01T00:00:00Z")
            .unwrap();

        let mut mark = Watermark::load(&store, Source::Github, false).unwrap();
        assert!(mark.cutoff().is_none());
        assert!(mark.observe(at(0, 0)));
    }

    #[test]
    fn test_items_at_cutoff_are_old() {
        let store = Store::open_in_memory().unwrap();
        let mut mark = Watermark::load(&store, Source::X, true).unwrap();
        mark.observe(at(1_700_000_000, 500));
        mark.commit(&store).unwrap();

        let mut mark = Watermark::load(&store, Source::X, true).unwrap();
        assert!(mark.observe(at(1_700_000_001, 0)));
        assert!(!mark.observe(at(1_700_000_000, 900_000_000)));
        assert!(!mark.observe(at(1_600_000_000, 0)));
    }

    #[test]
    fn test_commit_never_moves_backwards() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_metadata("raindrop_last_sync_ts", "2024-06-01T00:00:00Z")
            .unwrap();

        let mut mark = Watermark::load(&store, Source::Raindrop, false).unwrap();
        mark.observe("2024-01-01T00:00:00Z".parse().unwrap());
        mark.commit(&store).unwrap();

        assert_eq!(
            store.get_metadata("raindrop_last_sync_ts").unwrap(),
            "2024-06-01T00:00:00Z"
        );
    }

    #[test]
    fn test_unreadable_watermark_is_ignored() {
        let store = Store::open_in_memory().unwrap();
        store.set_metadata("x_last_sync_ts", "yesterday").unwrap();

        let mark = Watermark::load(&store, Source::X, true).unwrap();
        assert!(mark.cutoff().is_none());
    }
}
