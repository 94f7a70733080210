//! Bookmark source adapters.
//!
//! Every adapter shells out to a third-party CLI and maps its JSON output to
//! [`BookmarkCreate`] items. Incremental fetches stop at the per-source
//! watermark kept in the store's metadata table.

pub mod github;
pub mod raindrop;
pub mod watermark;
pub mod x;

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use anyhow::{anyhow, bail};

use crate::bookmarks::{BookmarkCreate, Source};
use crate::store::Store;

pub use watermark::Watermark;

/// A provider of bookmarks.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> Source;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether the backing integration can be reached.
    fn available(&self) -> bool;

    /// Pull bookmarks, newest first.
    ///
    /// With `incremental`, stops at items at or before the stored watermark.
    /// The watermark is advanced to the newest observed item either way.
    fn fetch(&self, incremental: bool) -> anyhow::Result<Vec<BookmarkCreate>>;
}

/// Runs external programs. Swapped out in tests.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> anyhow::Result<Vec<u8>>;

    fn exists(&self, program: &str) -> bool;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> anyhow::Result<Vec<u8>> {
        log::debug!("running {program} {}", args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| anyhow!("failed to run {program}: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{program} exited with {}: {}", output.status, stderr.trim());
        }

        Ok(output.stdout)
    }

    fn exists(&self, program: &str) -> bool {
        command_exists(program)
    }
}

/// Whether `program` is an executable file somewhere on `PATH`.
pub fn command_exists(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// All CLI-backed adapters, in sync order.
pub fn all_adapters(store: Arc<Store>, runner: Arc<dyn CommandRunner>) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(github::GithubSource::new(store.clone(), runner.clone())),
        Arc::new(x::XSource::new(store.clone(), runner.clone())),
        Arc::new(raindrop::RaindropSource::new(store, runner)),
    ]
}

/// Drop items without a URL, which the store cannot key.
pub(crate) fn keep_addressable(source: Source, items: Vec<BookmarkCreate>) -> Vec<BookmarkCreate> {
    let total = items.len();
    let items = items
        .into_iter()
        .filter(|item| !item.url.trim().is_empty())
        .collect::<Vec<_>>();
    if items.len() < total {
        log::warn!("{source}: dropped {} item(s) without a url", total - items.len());
    }
    items
}
