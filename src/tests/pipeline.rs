//! Enrichment pipeline against an in-memory store and fake providers.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use indicatif::ProgressBar;

use super::fakes::{memory_store, pipeline, FakeEmbedder, FakeFetcher, FakeSummarizer};
use crate::bookmarks::{BookmarkCreate, ScrapeStatus, Source};
use crate::eid::Eid;
use crate::enrich::StageResult;
use crate::store::Store;

fn add_manual(store: &Store, url: &str, title: &str) -> Eid {
    store
        .upsert(&BookmarkCreate {
            title: title.to_string(),
            ..BookmarkCreate::new(Source::Manual, url)
        })
        .unwrap();
    Eid::from_url(url)
}

#[test]
fn test_all_stages_succeed() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com", "Example");

    let embedder = Arc::new(FakeEmbedder::returning(vec![0.1, 0.2, 0.3]));
    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("hello world")),
        Some(Arc::new(FakeSummarizer::returning("Example site", "demo,example"))),
        Some(embedder.clone()),
    );

    let report = pipeline.run_batch(10, &ProgressBar::hidden()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.summarized, 1);
    assert_eq!(report.embedded, 1);
    assert_eq!(report.failed, 0);

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
    assert_eq!(stored.raw_content, "hello world");
    assert_eq!(stored.summary, "Example site");
    assert_eq!(stored.keywords, "demo,example");
    assert_eq!(stored.title, "Example");
    assert!(stored.scraped_at.is_some());

    assert_eq!(store.get_embedding(&id).unwrap(), Some(vec![0.1, 0.2, 0.3]));
    assert_eq!(
        embedder.inputs.lock().unwrap().as_slice(),
        ["Example Example site demo,example"]
    );
    assert!(store.get_pending(10).unwrap().is_empty());
}

#[test]
fn test_fetch_failure_marks_item_failed() {
    let store = memory_store();
    let id = add_manual(&store, "https://down.example", "Down");

    let summarizer = Arc::new(FakeSummarizer::returning("never", "never"));
    let embedder = Arc::new(FakeEmbedder::returning(vec![1.0]));
    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::failing()),
        Some(summarizer.clone()),
        Some(embedder.clone()),
    );

    let report = pipeline.run_batch(10, &ProgressBar::hidden()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);

    assert_eq!(store.get(&id).unwrap().scrape_status, ScrapeStatus::Failed);
    assert!(store.get_embedding(&id).unwrap().is_none());
    assert!(summarizer.inputs.lock().unwrap().is_empty());
    assert!(embedder.inputs.lock().unwrap().is_empty());

    // retried on the next batch
    assert_eq!(store.get_pending(10).unwrap().len(), 1);
}

#[test]
fn test_summary_failure_still_embeds() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com", "Example");

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("hello world")),
        Some(Arc::new(FakeSummarizer::failing())),
        Some(Arc::new(FakeEmbedder::returning(vec![0.5, 0.5]))),
    );

    let outcome = pipeline.enrich_one(&store.get(&id).unwrap()).unwrap();
    assert_eq!(outcome.fetch, StageResult::Done);
    assert_eq!(outcome.summary, StageResult::Failed);
    assert_eq!(outcome.embedding, StageResult::Done);
    assert!(outcome.succeeded());

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
    assert!(stored.summary.is_empty());
    assert_eq!(stored.raw_content, "hello world");
    assert!(store.get_embedding(&id).unwrap().is_some());
}

#[test]
fn test_embedding_failure_keeps_summary() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com", "Example");

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("hello world")),
        Some(Arc::new(FakeSummarizer::returning("Example site", "demo"))),
        Some(Arc::new(FakeEmbedder::failing())),
    );

    let report = pipeline.run_batch(10, &ProgressBar::hidden()).unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.embedding_errors, 1);

    let stored = store.get(&id).unwrap();
    assert_eq!(stored.scrape_status, ScrapeStatus::Success);
    assert_eq!(stored.summary, "Example site");
    assert!(store.get_embedding(&id).unwrap().is_none());
}

#[test]
fn test_one_failing_item_does_not_stop_the_batch() {
    let store = memory_store();
    add_manual(&store, "https://a.example", "A");
    add_manual(&store, "https://b.example", "B");

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::failing()),
        None,
        None,
    );
    let report = pipeline.run_batch(10, &ProgressBar::hidden()).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 2);
}

#[test]
fn test_without_providers_only_content_is_stored() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com", "Example");

    let pipeline = pipeline(&store, Arc::new(FakeFetcher::returning("text")), None, None);
    let outcome = pipeline.enrich_one(&store.get(&id).unwrap()).unwrap();

    assert_eq!(outcome.summary, StageResult::Skipped);
    assert_eq!(outcome.embedding, StageResult::Skipped);
    assert_eq!(store.get(&id).unwrap().scrape_status, ScrapeStatus::Success);
}

#[test]
fn test_existing_content_is_not_refetched() {
    let store = memory_store();
    let url = "https://x.com/someone/status/1";
    store
        .upsert(&BookmarkCreate {
            title: "A tweet".to_string(),
            raw_content: "the full tweet text".to_string(),
            ..BookmarkCreate::new(Source::X, url)
        })
        .unwrap();

    let fetcher = Arc::new(FakeFetcher::returning("should not be used"));
    let summarizer = Arc::new(FakeSummarizer::returning("A tweet about things", "tweet"));
    let pipeline = pipeline(&store, fetcher.clone(), Some(summarizer.clone()), None);

    let outcome = pipeline
        .enrich_one(&store.get(&Eid::from_url(url)).unwrap())
        .unwrap();
    assert_eq!(outcome.fetch, StageResult::Skipped);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        summarizer.inputs.lock().unwrap().as_slice(),
        ["the full tweet text"]
    );
    assert_eq!(
        store.get(&Eid::from_url(url)).unwrap().raw_content,
        "the full tweet text"
    );
}

#[test]
fn test_missing_title_is_derived_from_content() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com/page", "");

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("Title: Hello World\n\nbody text")),
        None,
        None,
    );
    pipeline.run_batch(10, &ProgressBar::hidden()).unwrap();

    assert_eq!(store.get(&id).unwrap().title, "Hello World");
}

#[test]
fn test_existing_summary_is_kept() {
    let store = memory_store();
    let url = "https://github.com/tokio-rs/tokio";
    store
        .upsert(&BookmarkCreate {
            title: "tokio-rs/tokio".to_string(),
            summary: "A runtime for async Rust".to_string(),
            ..BookmarkCreate::new(Source::Github, url)
        })
        .unwrap();

    let summarizer = Arc::new(FakeSummarizer::returning("Generated", "generated"));
    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("readme")),
        Some(summarizer.clone()),
        None,
    );
    let outcome = pipeline
        .enrich_one(&store.get(&Eid::from_url(url)).unwrap())
        .unwrap();

    assert_eq!(outcome.summary, StageResult::Skipped);
    assert!(summarizer.inputs.lock().unwrap().is_empty());
    assert_eq!(
        store.get(&Eid::from_url(url)).unwrap().summary,
        "A runtime for async Rust"
    );
}

#[test]
fn test_batch_limit_is_honoured() {
    let store = memory_store();
    for i in 0..5 {
        add_manual(&store, &format!("https://example.com/{i}"), "page");
    }

    let pipeline = pipeline(&store, Arc::new(FakeFetcher::returning("text")), None, None);
    let report = pipeline.run_batch(2, &ProgressBar::hidden()).unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(store.get_pending(10).unwrap().len(), 3);
}

#[test]
fn test_deleted_item_is_reported_as_vanished() {
    let store = memory_store();
    let id = add_manual(&store, "https://example.com", "Example");
    let snapshot = store.get(&id).unwrap();
    store.delete(&id).unwrap();

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::returning("text")),
        None,
        Some(Arc::new(FakeEmbedder::returning(vec![1.0]))),
    );
    let outcome = pipeline.enrich_one(&snapshot).unwrap();

    assert!(!outcome.persisted);
    assert_eq!(outcome.embedding, StageResult::Skipped);
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.get_all_embeddings().unwrap().is_empty());
}

#[test]
fn test_resummarize_fills_missing_summaries() {
    let store = memory_store();
    let url = "https://example.com/article";
    store
        .upsert(&BookmarkCreate {
            title: "Article".to_string(),
            raw_content: "long article text".to_string(),
            scrape_status: Some(ScrapeStatus::Success),
            ..BookmarkCreate::new(Source::Raindrop, url)
        })
        .unwrap();
    add_manual(&store, "https://example.com/no-content", "No content");

    let pipeline = pipeline(
        &store,
        Arc::new(FakeFetcher::failing()),
        Some(Arc::new(FakeSummarizer::returning("About an article", "article"))),
        None,
    );
    let report = pipeline.resummarize(None, &ProgressBar::hidden()).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.summarized, 1);
    assert_eq!(
        store.get(&Eid::from_url(url)).unwrap().summary,
        "About an article"
    );

    let again = pipeline.resummarize(None, &ProgressBar::hidden()).unwrap();
    assert_eq!(again.processed, 0);
}
