//! Fire-and-forget background work.
//!
//! A task runs on its own thread; a second watcher thread joins it so that
//! errors and panics are logged instead of reaching the foreground.

use std::thread::JoinHandle;

/// Handle to a background task. Dropping it detaches the task.
pub struct BackgroundTask {
    name: String,
    watcher: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn spawn<F>(name: &str, task: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let task_name = name.to_string();
        let task_handle = std::thread::spawn(move || {
            if let Err(err) = task() {
                log::warn!("{task_name}: {err:#}");
            }
        });

        // handle thread panics
        let watcher_name = name.to_string();
        let watcher = std::thread::spawn(move || {
            if let Err(err) = task_handle.join() {
                log::error!("{watcher_name} panicked: {err:?}");
            }
        });

        Self {
            name: name.to_string(),
            watcher: Some(watcher),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.watcher.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Wait for the task to finish. Its outcome has already been logged.
    pub fn join(mut self) {
        if let Some(watcher) = self.watcher.take() {
            log::debug!("waiting for {}", self.name);
            if watcher.join().is_err() {
                log::error!("{} watcher panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_join_waits_for_task() {
        let ran = Arc::new(AtomicBool::new(false));
        let task = BackgroundTask::spawn("test", {
            let ran = ran.clone();
            move || {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        task.join();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_errors_and_panics_stay_in_background() {
        BackgroundTask::spawn("failing", || anyhow::bail!("boom")).join();
        BackgroundTask::spawn("panicking", || panic!("boom")).join();
    }
}
