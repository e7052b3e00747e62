//! Instance file watcher.
//!
//! The file lists one instance address per line; blank lines and lines
//! starting with `#` are ignored. Every change is diffed against the last
//! membership seen by that subscription and emitted as events.
//!
//! Each subscription owns its watcher; it is released once the receiving
//! side of the stream is dropped.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::discovery::{DiscoveryEvent, EventStream, Instance, Instancer};

/// An instancer that follows a file on disk.
#[derive(Debug, Clone)]
pub struct FileInstancer {
    path: PathBuf,
}

impl FileInstancer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn start_watch(
        &self,
        tx: mpsc::UnboundedSender<DiscoveryEvent>,
        known: Arc<Mutex<BTreeSet<Instance>>>,
    ) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let file_name = path.file_name().map(|name| name.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_file || event.kind.is_access() {
                        return;
                    }

                    let changes = sync_instances(&path, &known, &tx);
                    if changes > 0 {
                        tracing::info!(path = ?path, changes, "Instance file changed");
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Watch the directory so editors that replace the file are still seen.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Instance file watcher started");
        Ok(watcher)
    }
}

impl Instancer for FileInstancer {
    /// Must be called inside a Tokio runtime.
    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let known = Arc::new(Mutex::new(BTreeSet::new()));

        // Watcher first, so a write racing the initial read is never lost.
        let watcher = self.start_watch(tx.clone(), known.clone());
        sync_instances(&self.path, &known, &tx);

        match watcher {
            Ok(watcher) => {
                let path = self.path.clone();
                tokio::spawn(async move {
                    tx.closed().await;
                    drop(watcher);
                    tracing::debug!(path = ?path, "Instance file watcher stopped");
                });
            }
            // Stream still carries the initial membership, it just never changes.
            Err(e) => tracing::error!(path = ?self.path, error = %e, "Failed to watch instance file"),
        }

        rx
    }
}

/// Re-read the file and emit its difference from `known`. The read happens
/// under the lock, so concurrent syncs apply in order. Returns the number of
/// events sent.
fn sync_instances(
    path: &Path,
    known: &Mutex<BTreeSet<Instance>>,
    tx: &mpsc::UnboundedSender<DiscoveryEvent>,
) -> usize {
    let mut known = known.lock().unwrap_or_else(PoisonError::into_inner);
    let current = read_instances(path);
    let events = diff_instances(&known, &current);
    let changes = events.len();
    for event in events {
        let _ = tx.send(event);
    }
    *known = current;
    changes
}

/// Parse instance file content.
pub fn parse_instances(content: &str) -> BTreeSet<Instance> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Instance::from)
        .collect()
}

fn read_instances(path: &Path) -> BTreeSet<Instance> {
    match fs::read_to_string(path) {
        Ok(content) => parse_instances(&content),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Cannot read instance file, treating as empty");
            BTreeSet::new()
        }
    }
}

/// Events turning `old` into `new`: removals first, then additions.
pub fn diff_instances(old: &BTreeSet<Instance>, new: &BTreeSet<Instance>) -> Vec<DiscoveryEvent> {
    old.difference(new)
        .cloned()
        .map(DiscoveryEvent::Removed)
        .chain(new.difference(old).cloned().map(DiscoveryEvent::Added))
        .collect()
}
