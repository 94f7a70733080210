use chrono::{Duration, Utc};

use super::fakes::memory_store;
use crate::bookmarks::{BookmarkCreate, BookmarkUpdate, ScrapeStatus, Source};
use crate::eid::Eid;
use crate::store::{Enrichment, Store, StoreError};

fn add(store: &Store, source: Source, url: &str) -> Eid {
    store.upsert(&BookmarkCreate::new(source, url)).unwrap();
    Eid::from_url(url)
}

#[test]
fn test_upsert_is_idempotent() {
    let store = memory_store();
    let item = BookmarkCreate {
        title: "Rust".to_string(),
        ..BookmarkCreate::new(Source::Github, "https://github.com/rust-lang/rust")
    };

    assert!(store.upsert(&item).unwrap());
    assert!(!store.upsert(&item).unwrap());
    assert_eq!(store.count().unwrap(), 1);

    let stored = store.get(&item.id()).unwrap();
    assert_eq!(stored.id, Eid::from_url("https://github.com/rust-lang/rust"));
    assert_eq!(stored.scrape_status, ScrapeStatus::Pending);
}

#[test]
fn test_merge_keeps_fields_the_incoming_item_lacks() {
    let store = memory_store();
    let url = "https://example.com/post";
    store
        .upsert(&BookmarkCreate {
            title: "Original".to_string(),
            summary: "A post".to_string(),
            notes: "mine".to_string(),
            ..BookmarkCreate::new(Source::Raindrop, url)
        })
        .unwrap();
    let before = store.get_by_url(url).unwrap();

    store
        .upsert(&BookmarkCreate {
            keywords: "blog".to_string(),
            ..BookmarkCreate::new(Source::Raindrop, url)
        })
        .unwrap();

    let after = store.get_by_url(url).unwrap();
    assert_eq!(after.title, "Original");
    assert_eq!(after.summary, "A post");
    assert_eq!(after.notes, "mine");
    assert_eq!(after.keywords, "blog");
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
}

#[test]
fn test_urls_differing_in_whitespace_are_one_record() {
    let store = memory_store();
    assert!(store
        .upsert(&BookmarkCreate::new(Source::Manual, "https://example.com"))
        .unwrap());
    assert!(!store
        .upsert(&BookmarkCreate::new(Source::Manual, "  https://example.com\n"))
        .unwrap());
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_upsert_rejects_incomplete_records() {
    let store = memory_store();
    assert!(matches!(
        store.upsert(&BookmarkCreate::new(Source::X, "   ")),
        Err(StoreError::InvalidRecord(_))
    ));

    let no_source = BookmarkCreate {
        url: "https://example.com".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        store.upsert(&no_source),
        Err(StoreError::InvalidRecord(_))
    ));
}

#[test]
fn test_future_created_at_is_clamped() {
    let store = memory_store();
    let item = BookmarkCreate {
        created_at: Some(Utc::now() + Duration::days(30)),
        ..BookmarkCreate::new(Source::X, "https://x.com/a/status/1")
    };
    store.upsert(&item).unwrap();

    let stored = store.get(&item.id()).unwrap();
    assert!(stored.created_at <= Utc::now());
}

#[test]
fn test_reprocess_clears_pipeline_output() {
    let store = memory_store();
    let id = add(&store, Source::Github, "https://github.com/a/b");
    store
        .record_enrichment(
            &id,
            &Enrichment {
                raw_content: "content".to_string(),
                summary: "summary".to_string(),
                keywords: "a,b".to_string(),
                status: ScrapeStatus::Success,
                ..Default::default()
            },
        )
        .unwrap();
    store
        .apply_user_edit(
            &id,
            &BookmarkUpdate {
                notes: Some("keep me".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(store.get_pending(10).unwrap().is_empty());

    store.mark_for_reprocess(&[id.clone()]).unwrap();

    let reset = store.get(&id).unwrap();
    assert_eq!(reset.scrape_status, ScrapeStatus::Pending);
    assert!(reset.raw_content.is_empty());
    assert!(reset.summary.is_empty());
    assert!(reset.keywords.is_empty());
    assert_eq!(reset.notes, "keep me");

    let pending = store.get_pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
}

#[test]
fn test_failed_items_stay_pending() {
    let store = memory_store();
    let id = add(&store, Source::Raindrop, "https://example.com/flaky");

    assert!(store.mark_failed(&id).unwrap());
    assert_eq!(store.get(&id).unwrap().scrape_status, ScrapeStatus::Failed);
    assert_eq!(store.get_pending(10).unwrap().len(), 1);
}

#[test]
fn test_content_on_arrival_is_not_pending() {
    let store = memory_store();
    let url = "https://example.com/with-text";
    store
        .upsert(&BookmarkCreate {
            raw_content: "already known text".to_string(),
            ..BookmarkCreate::new(Source::Raindrop, url)
        })
        .unwrap();

    let stored = store.get_by_url(url).unwrap();
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
    assert!(store.get_pending(10).unwrap().is_empty());

    // an explicit status still wins
    let failed = "https://example.com/flagged";
    store
        .upsert(&BookmarkCreate {
            raw_content: "partial".to_string(),
            scrape_status: Some(ScrapeStatus::Failed),
            ..BookmarkCreate::new(Source::Raindrop, failed)
        })
        .unwrap();
    assert_eq!(
        store.get_by_url(failed).unwrap().scrape_status,
        ScrapeStatus::Failed
    );
}

#[test]
fn test_content_merged_into_pending_record_marks_success() {
    let store = memory_store();
    let id = add(&store, Source::Raindrop, "https://example.com/later");
    assert_eq!(store.get(&id).unwrap().scrape_status, ScrapeStatus::Pending);

    store
        .upsert(&BookmarkCreate {
            raw_content: "text from a later sync".to_string(),
            ..BookmarkCreate::new(Source::Raindrop, "https://example.com/later")
        })
        .unwrap();

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.raw_content, "text from a later sync");
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
}

#[test]
fn test_searchable_embeddings_skip_hidden_rows() {
    let store = memory_store();
    let shown = add(&store, Source::Manual, "https://shown.example");
    let hidden = add(&store, Source::Manual, "https://hidden.example");
    store.update_embedding(&shown, &[1.0, 0.0]).unwrap();
    store.update_embedding(&hidden, &[0.0, 1.0]).unwrap();
    store
        .apply_user_edit(
            &hidden,
            &BookmarkUpdate {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(store.get_all_embeddings().unwrap().len(), 2);
    let searchable = store.get_searchable_embeddings().unwrap();
    assert_eq!(searchable.len(), 1);
    assert!(searchable.contains_key(&shown));
}

#[test]
fn test_delete_removes_embedding() {
    let store = memory_store();
    let id = add(&store, Source::Manual, "https://example.com");
    assert!(store.update_embedding(&id, &[0.1, 0.2, 0.3]).unwrap());

    assert!(store.delete(&id).unwrap());
    assert!(matches!(store.get(&id), Err(StoreError::NotFound)));
    assert!(store.get_embedding(&id).unwrap().is_none());
    assert!(store.get_all_embeddings().unwrap().is_empty());

    assert!(!store.delete(&id).unwrap());
}

#[test]
fn test_embedding_for_missing_bookmark_is_not_written() {
    let store = memory_store();
    assert!(!store.update_embedding("0000000000000000", &[1.0]).unwrap());
    assert!(store.get_all_embeddings().unwrap().is_empty());
}

#[test]
fn test_embedding_is_replaced() {
    let store = memory_store();
    let id = add(&store, Source::Manual, "https://example.com");
    store.update_embedding(&id, &[1.0, 0.0]).unwrap();
    store.update_embedding(&id, &[0.0, 1.0]).unwrap();

    assert_eq!(store.get_embedding(&id).unwrap(), Some(vec![0.0, 1.0]));
    assert_eq!(store.get_all_embeddings().unwrap().len(), 1);
}

#[test]
fn test_orphans_are_scoped_to_source() {
    let store = memory_store();
    add(&store, Source::Raindrop, "https://a.example");
    let gone = add(&store, Source::Raindrop, "https://b.example");
    add(&store, Source::Raindrop, "https://c.example");
    add(&store, Source::Github, "https://github.com/x/y");

    let current = vec!["https://a.example".to_string(), "https://c.example".to_string()];
    let orphans = store.get_orphaned_by_source(Source::Raindrop, &current).unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, gone);

    store.delete(&orphans[0].id).unwrap();
    assert_eq!(store.list(&[Source::Raindrop], 10).unwrap().len(), 2);
    assert_eq!(store.list(&[Source::Github], 10).unwrap().len(), 1);
}

#[test]
fn test_metadata_defaults_to_empty() {
    let store = memory_store();
    assert_eq!(store.get_metadata("x_last_sync_ts").unwrap(), "");

    store.set_metadata("x_last_sync_ts", "2024-01-01T00:00:00Z").unwrap();
    store.set_metadata("x_last_sync_ts", "2024-02-01T00:00:00Z").unwrap();
    assert_eq!(
        store.get_metadata("x_last_sync_ts").unwrap(),
        "2024-02-01T00:00:00Z"
    );
}

#[test]
fn test_list_orders_synced_items_by_upstream_time() {
    let store = memory_store();
    let now = Utc::now();
    for (url, age_days) in [("https://old.example", 10), ("https://new.example", 1)] {
        store
            .upsert(&BookmarkCreate {
                created_at: Some(now - Duration::days(age_days)),
                ..BookmarkCreate::new(Source::Raindrop, url)
            })
            .unwrap();
    }

    let urls: Vec<String> = store
        .list(&[], 10)
        .unwrap()
        .into_iter()
        .map(|b| b.url)
        .collect();
    assert_eq!(urls, vec!["https://new.example", "https://old.example"]);
}

#[test]
fn test_hidden_bookmarks_are_not_listed_or_counted() {
    let store = memory_store();
    let id = add(&store, Source::Manual, "https://secret.example");
    add(&store, Source::Manual, "https://public.example");

    let hidden = store
        .apply_user_edit(
            &id,
            &BookmarkUpdate {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(hidden.hidden);

    assert_eq!(store.count().unwrap(), 1);
    let listed = store.list(&[], 10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].url, "https://public.example");
}

#[test]
fn test_user_edit_of_missing_bookmark() {
    let store = memory_store();
    let update = BookmarkUpdate {
        title: Some("x".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        store.apply_user_edit("0000000000000000", &update),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn test_enrichment_never_overwrites_user_fields() {
    let store = memory_store();
    let url = "https://example.com/article";
    store
        .upsert(&BookmarkCreate {
            title: "My title".to_string(),
            summary: "My own summary".to_string(),
            ..BookmarkCreate::new(Source::Manual, url)
        })
        .unwrap();
    let id = Eid::from_url(url);

    let persisted = store
        .record_enrichment(
            &id,
            &Enrichment {
                title: Some("Page title".to_string()),
                raw_content: "body".to_string(),
                summary: "Generated".to_string(),
                keywords: "generated".to_string(),
                status: ScrapeStatus::Success,
            },
        )
        .unwrap();
    assert!(persisted);

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.title, "My title");
    assert_eq!(stored.summary, "My own summary");
    assert_eq!(stored.keywords, "generated");
    assert_eq!(stored.raw_content, "body");
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
    assert!(stored.scraped_at.is_some());
}

#[test]
fn test_enrichment_of_deleted_bookmark_is_dropped() {
    let store = memory_store();
    let id = add(&store, Source::Manual, "https://example.com");
    store.delete(&id).unwrap();

    assert!(!store.record_enrichment(&id, &Enrichment::default()).unwrap());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_lexical_search_matches_all_text_fields() {
    let store = memory_store();
    store
        .upsert(&BookmarkCreate {
            title: "Tokio".to_string(),
            summary: "An asynchronous runtime".to_string(),
            ..BookmarkCreate::new(Source::Github, "https://github.com/tokio-rs/tokio")
        })
        .unwrap();
    store
        .upsert(&BookmarkCreate {
            title: "Cooking".to_string(),
            notes: "pasta recipes".to_string(),
            ..BookmarkCreate::new(Source::Manual, "https://food.example")
        })
        .unwrap();

    let hits = store.lexical_search("asynchronous", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, Eid::from_url("https://github.com/tokio-rs/tokio"));
    assert_eq!(hits[0].rank, 1);

    let hits = store.lexical_search("pasta", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, Eid::from_url("https://food.example"));
}

#[test]
fn test_lexical_search_follows_edits() {
    let store = memory_store();
    let id = add(&store, Source::Manual, "https://example.com");
    assert!(store.lexical_search("zeppelin", 10).unwrap().is_empty());

    store
        .apply_user_edit(
            &id,
            &BookmarkUpdate {
                title: Some("Zeppelin history".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(store.lexical_search("zeppelin", 10).unwrap().len(), 1);

    store.delete(&id).unwrap();
    assert!(store.lexical_search("zeppelin", 10).unwrap().is_empty());
}

#[test]
fn test_malformed_fts_query_returns_nothing() {
    let store = memory_store();
    add(&store, Source::Manual, "https://example.com");

    assert!(store.lexical_search("\"unterminated", 10).unwrap().is_empty());
    assert!(store.lexical_search("AND OR", 10).unwrap().is_empty());
    assert!(store.lexical_search("   ", 10).unwrap().is_empty());
}

#[test]
fn test_store_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        add(&store, Source::Manual, "https://example.com");
        store.set_metadata("last_refresh_at", "2024-01-01T00:00:00Z").unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(
        store.get_metadata("last_refresh_at").unwrap(),
        "2024-01-01T00:00:00Z"
    );
}
