use std::sync::Arc;

use indicatif::ProgressBar;

use crate::{
    app::{
        errors::AppError,
        sync::{refresh_due, FetchOptions, LockMode, SyncCoordinator, SyncReport},
        task_runner::BackgroundTask,
    },
    bookmarks::{Bookmark, BookmarkCreate, BookmarkUpdate, Source},
    config::Config,
    eid::{canonical_url, Eid},
    enrich::{ItemOutcome, Pipeline, PipelineReport},
    semantic::SearchService,
    store::{Store, StoreError},
};

pub type Result<T> = std::result::Result<T, AppError>;

/// Everything the CLI can ask of the engine.
pub struct AppService {
    config: Config,
    store: Arc<Store>,
    pipeline: Arc<Pipeline>,
    sync: Arc<SyncCoordinator>,
    search: SearchService,
}

impl AppService {
    pub fn new(
        config: Config,
        store: Arc<Store>,
        pipeline: Arc<Pipeline>,
        sync: Arc<SyncCoordinator>,
        search: SearchService,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
            sync,
            search,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn default_fetch_options(&self) -> FetchOptions {
        FetchOptions {
            batch_limit: self.config.pipeline.batch_limit,
            ..Default::default()
        }
    }

    /// Run one sync cycle, waiting for any other process's cycle to finish first.
    pub fn fetch(&self, options: &FetchOptions, progress: &ProgressBar) -> Result<SyncReport> {
        self.sync.run(options, LockMode::Wait, progress)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Bookmark>> {
        Ok(self.search.search(query, limit)?)
    }

    pub fn list(&self, sources: &[Source], limit: usize) -> Result<Vec<Bookmark>> {
        Ok(self.store.list(sources, limit)?)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.store.count()?)
    }

    /// Index a URL by hand and enrich it right away.
    pub fn add_manual(&self, url: &str, title: Option<String>, notes: Option<String>) -> Result<(Bookmark, ItemOutcome)> {
        let url = canonical_url(url);
        match self.store.get_by_url(url) {
            Ok(existing) => return Err(AppError::AlreadyExists(existing.id.to_string())),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let create = BookmarkCreate {
            title: title.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
            ..BookmarkCreate::new(Source::Manual, url)
        };
        self.store.upsert(&create)?;
        log::info!("added {url}");

        self.enrich_now(&create.id())
    }

    /// Reset one bookmark and run the whole pipeline on it again.
    pub fn reprocess(&self, id_or_url: &str) -> Result<(Bookmark, ItemOutcome)> {
        let bookmark = self.resolve(id_or_url)?.ok_or(AppError::NotFound)?;
        self.store.mark_for_reprocess(&[bookmark.id.clone()])?;
        self.enrich_now(&bookmark.id)
    }

    pub fn resummarize(&self, limit: Option<usize>, progress: &ProgressBar) -> Result<PipelineReport> {
        Ok(self.pipeline.resummarize(limit, progress)?)
    }

    /// Returns `false` when nothing matched.
    pub fn delete(&self, id_or_url: &str) -> Result<bool> {
        match self.resolve(id_or_url)? {
            Some(bookmark) => Ok(self.store.delete(&bookmark.id)?),
            None => Ok(false),
        }
    }

    pub fn edit(&self, id_or_url: &str, update: &BookmarkUpdate) -> Result<Bookmark> {
        let bookmark = self.resolve(id_or_url)?.ok_or(AppError::NotFound)?;
        self.store
            .apply_user_edit(&bookmark.id, update)
            .map_err(AppError::from_lookup)
    }

    /// Look up by id first, then by URL.
    pub fn resolve(&self, id_or_url: &str) -> Result<Option<Bookmark>> {
        let key = id_or_url.trim();
        if Eid::looks_like_id(key) {
            match self.store.get(key) {
                Ok(bookmark) => return Ok(Some(bookmark)),
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }
        match self.store.get_by_url(key) {
            Ok(bookmark) => Ok(Some(bookmark)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn refresh_due(&self) -> Result<bool> {
        Ok(refresh_due(&self.store, self.config.refresh.interval())?)
    }

    /// Start a sync cycle in the background when auto refresh is on and due.
    ///
    /// Skips quietly when another process already holds the sync lock.
    pub fn spawn_background_refresh(&self) -> Result<Option<BackgroundTask>> {
        if !self.config.refresh.auto || !self.refresh_due()? {
            return Ok(None);
        }

        log::debug!("refresh due, syncing in the background");
        let sync = self.sync.clone();
        let options = self.default_fetch_options();
        Ok(Some(BackgroundTask::spawn("background refresh", move || {
            match sync.run(&options, LockMode::Try, &ProgressBar::hidden()) {
                Ok(report) => {
                    log::info!("background refresh: {} new bookmark(s)", report.new_items());
                    Ok(())
                }
                Err(AppError::SyncInProgress) => {
                    log::debug!("background refresh skipped, another sync is running");
                    Ok(())
                }
                Err(err) => Err(err.into()),
            }
        })))
    }

    fn enrich_now(&self, id: &Eid) -> Result<(Bookmark, ItemOutcome)> {
        let bookmark = self.store.get(id).map_err(AppError::from_lookup)?;
        let outcome = self.pipeline.enrich_one(&bookmark)?;
        let bookmark = self.store.get(id).map_err(AppError::from_lookup)?;
        Ok((bookmark, outcome))
    }
}
