//! One fetch cycle across the configured bookmark sources.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indicatif::ProgressBar;

use crate::app::errors::AppError;
use crate::bookmarks::Source;
use crate::eid::canonical_url;
use crate::enrich::{Pipeline, PipelineReport};
use crate::lock::{self, FileLock};
use crate::sources::SourceAdapter;
use crate::store::{Store, StoreError};

/// Metadata key holding the time of the last completed cycle.
pub const LAST_REFRESH_KEY: &str = "last_refresh_at";

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Full, non-incremental resync with orphan removal.
    pub force: bool,
    /// Reset already known items so they are enriched again.
    pub reprocess: bool,
    /// Restrict the cycle to these sources; empty means all.
    pub sources: Vec<Source>,
    /// Most pending items handed to the pipeline.
    pub batch_limit: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            force: false,
            reprocess: false,
            sources: vec![],
            batch_limit: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub found: usize,
    pub new: usize,
    pub orphans_deleted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub sources: Vec<SourceReport>,
    /// Sources skipped because their integration is unreachable.
    pub unavailable: Vec<Source>,
    pub fetch_errors: usize,
    /// `None` when enrichment was skipped.
    pub pipeline: Option<PipelineReport>,
}

impl SourceReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            found: 0,
            new: 0,
            orphans_deleted: 0,
            error: None,
        }
    }
}

impl SyncReport {
    pub fn new_items(&self) -> usize {
        self.sources.iter().map(|s| s.new).sum()
    }

    pub fn found_items(&self) -> usize {
        self.sources.iter().map(|s| s.found).sum()
    }

    pub fn orphans_deleted(&self) -> usize {
        self.sources.iter().map(|s| s.orphans_deleted).sum()
    }
}

/// How a cycle treats the cross-process lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Wait for another process to finish.
    Wait,
    /// Give up with [`AppError::SyncInProgress`] if another process syncs.
    Try,
}

pub struct SyncCoordinator {
    store: Arc<Store>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    pipeline: Arc<Pipeline>,
    lock_dir: Option<PathBuf>,
}

impl SyncCoordinator {
    /// `adapters` should already be restricted to the configured-on sources.
    pub fn new(
        store: Arc<Store>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            store,
            adapters,
            pipeline,
            lock_dir: None,
        }
    }

    /// Serialise cycles across processes with a lock file in `dir`.
    pub fn with_lock_dir(mut self, dir: PathBuf) -> Self {
        self.lock_dir = Some(dir);
        self
    }

    pub fn run(
        &self,
        options: &FetchOptions,
        mode: LockMode,
        progress: &ProgressBar,
    ) -> Result<SyncReport, AppError> {
        let _lock = self.acquire(mode)?;
        let _span = tracing::info_span!("sync", force = options.force, reprocess = options.reprocess).entered();
        self.run_cycle(options, progress)
    }

    fn acquire(&self, mode: LockMode) -> Result<Option<FileLock>, AppError> {
        let Some(dir) = &self.lock_dir else {
            return Ok(None);
        };
        let lock = match mode {
            LockMode::Wait => FileLock::acquire_blocking(dir),
            LockMode::Try => FileLock::try_acquire(dir),
        };
        match lock {
            Ok(lock) => Ok(Some(lock)),
            Err(err) if lock::is_contended(&err) => Err(AppError::SyncInProgress),
            Err(err) => Err(AppError::IO(err)),
        }
    }

    fn select(&self, options: &FetchOptions, report: &mut SyncReport) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(|adapter| options.sources.is_empty() || options.sources.contains(&adapter.kind()))
            .filter(|adapter| {
                let available = adapter.available();
                if !available {
                    log::warn!("{}: source unavailable, skipping", adapter.name());
                    report.unavailable.push(adapter.kind());
                }
                available
            })
            .cloned()
            .collect()
    }

    fn run_cycle(&self, options: &FetchOptions, progress: &ProgressBar) -> Result<SyncReport, AppError> {
        let mut report = SyncReport::default();

        let adapters = self.select(options, &mut report);
        if adapters.is_empty() {
            return Err(AppError::NoSourcesAvailable);
        }

        let incremental = !options.force;
        for adapter in adapters {
            let source_report = self.sync_source(adapter.as_ref(), incremental, options)?;
            if source_report.error.is_some() {
                report.fetch_errors += 1;
            }
            report.sources.push(source_report);
        }

        if report.new_items() > 0 || options.reprocess || options.force {
            progress.set_message("enriching");
            report.pipeline = Some(self.pipeline.run_batch(options.batch_limit, progress)?);
        } else {
            log::debug!("nothing new, skipping enrichment");
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.store.set_metadata(LAST_REFRESH_KEY, &now)?;

        log::info!(
            "sync finished: {} found, {} new, {} orphan(s) deleted, {} source error(s)",
            report.found_items(),
            report.new_items(),
            report.orphans_deleted(),
            report.fetch_errors
        );
        Ok(report)
    }

    fn sync_source(
        &self,
        adapter: &dyn SourceAdapter,
        incremental: bool,
        options: &FetchOptions,
    ) -> Result<SourceReport, StoreError> {
        let source = adapter.kind();
        let mut report = SourceReport::new(source);

        let items = match adapter.fetch(incremental) {
            Ok(items) => items,
            Err(err) => {
                log::warn!("{}: fetch failed: {err:#}", adapter.name());
                report.error = Some(format!("{err:#}"));
                return Ok(report);
            }
        };
        report.found = items.len();

        let mut existing = vec![];
        for item in &items {
            match self.store.upsert(item) {
                Ok(true) => report.new += 1,
                Ok(false) => existing.push(item.id()),
                Err(StoreError::InvalidRecord(reason)) => {
                    log::warn!("{}: skipping {:?}: {reason}", adapter.name(), item.url);
                }
                Err(err) => return Err(err),
            }
        }

        if options.reprocess && !existing.is_empty() {
            self.store.mark_for_reprocess(&existing)?;
        }

        if options.force {
            let current: Vec<String> = items.iter().map(|i| canonical_url(&i.url).to_string()).collect();
            for orphan in self.store.get_orphaned_by_source(source, &current)? {
                log::info!("{}: removing {} (gone upstream)", adapter.name(), orphan.url);
                if self.store.delete(&orphan.id)? {
                    report.orphans_deleted += 1;
                }
            }
        }

        log::debug!(
            "{}: {} found, {} new, {} orphan(s)",
            adapter.name(),
            report.found,
            report.new,
            report.orphans_deleted
        );
        Ok(report)
    }
}

/// Whether the last completed cycle is missing, unreadable, or older than `interval`.
pub fn refresh_due(store: &Store, interval: chrono::Duration) -> Result<bool, StoreError> {
    let raw = store.get_metadata(LAST_REFRESH_KEY)?;
    if raw.is_empty() {
        return Ok(true);
    }
    Ok(match DateTime::parse_from_rfc3339(&raw) {
        Ok(last) => Utc::now().signed_duration_since(last.with_timezone(&Utc)) > interval,
        Err(err) => {
            log::debug!("unreadable {LAST_REFRESH_KEY} {raw:?}: {err}");
            true
        }
    })
}
