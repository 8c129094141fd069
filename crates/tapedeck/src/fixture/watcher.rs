//! Hot reload of the fixture directory.
//!
//! Filesystem notifications are turned into a stream of changed paths.
//! The reload loop waits for a short debounce window after the first
//! relevant change, drains whatever else arrived meanwhile and reloads the
//! registry once.

use super::registry::{is_fixture_file, RouteRegistry};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Keeps the OS watcher and the reload task alive.
pub struct FixtureWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl FixtureWatcher {
    /// Watch `dir` (non-recursively) and reload `registry` on changes.
    pub fn start(
        registry: Arc<RouteRegistry>,
        dir: PathBuf,
        debounce: Duration,
    ) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in relevant_paths(&event) {
                    let _ = tx.send(path);
                }
            }
            Err(e) => warn!("Watcher error: {}", e),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching for changes in {}", dir.display());

        let task = tokio::spawn(run_reload_loop(rx, registry, dir, debounce));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for FixtureWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Changed fixture files carried by a create or modify event.
pub fn relevant_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|path| is_fixture_file(path))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Reload `registry` from `dir` once per burst of changes. Returns when
/// the sending side of `changes` is dropped.
pub async fn run_reload_loop(
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    registry: Arc<RouteRegistry>,
    dir: PathBuf,
    debounce: Duration,
) {
    while let Some(first) = changes.recv().await {
        info!("Config file changed: {}", first.display());
        tokio::time::sleep(debounce).await;

        let mut coalesced = 0usize;
        while let Ok(path) = changes.try_recv() {
            debug!("Coalescing change: {}", path.display());
            coalesced += 1;
        }
        if coalesced > 0 {
            debug!("Coalesced {} additional changes into one reload", coalesced);
        }

        reload_blocking(&registry, &dir).await;
    }
}

async fn reload_blocking(registry: &Arc<RouteRegistry>, dir: &Path) {
    let registry = Arc::clone(registry);
    let dir = dir.to_path_buf();
    match tokio::task::spawn_blocking(move || registry.reload(&dir)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("Error reloading routes: {}", e),
        Err(e) => error!("Reload task failed: {}", e),
    }
}
