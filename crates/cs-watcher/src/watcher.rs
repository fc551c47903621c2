//! Multi-root file watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` watcher to the tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ Blocking Thread (spawn_blocking)                                  │
//! │  owns RecommendedWatcher, serves Watch / Shutdown commands        │
//! └───────────────────────────────────────────────────────────────────┘
//!          ▲ commands
//!          │                 ┌──────────────────────────────────────┐
//!          │                 │ Notification Thread (notify backend) │
//!          │                 │  kind mapping -> classify -> read    │
//!          │                 └──────────────────┬───────────────────┘
//!          │                                    │ blocking_send
//!          │                                    ▼
//! ┌────────┴──────────┐              ┌─────────────────────────┐
//! │ FileWatcher       │              │ mpsc::Receiver          │
//! │ (async control)   │              │ <ChangeEvent> (owner)   │
//! └───────────────────┘              └─────────────────────────┘
//! ```
//!
//! The notify backend calls back on its own thread; each relevant raw event is
//! turned into [`ChangeEvent`]s there and pushed into the channel. Directory
//! events and irrelevant paths are dropped before any file is read.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher as _};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use cs_core::WatchConfig;

use crate::classify::{Classification, PathClassifier};
use crate::error::WatchError;
use crate::events::{ChangeEvent, ChangeKind};
use crate::roots::RootSet;

/// Requests served by the blocking watcher thread.
enum Command {
    Watch {
        root: Utf8PathBuf,
        reply: oneshot::Sender<Result<(), WatchError>>,
    },
    Shutdown,
}

/// A watcher over a set of root directories.
///
/// # Lifecycle
///
/// 1. **Start**: [`FileWatcher::start`] spawns the blocking watcher thread and
///    waits until every root has been subscribed (or has failed to).
/// 2. **Extend**: [`FileWatcher::watch`] subscribes one more root while running.
/// 3. **Shutdown**: [`FileWatcher::shutdown`] stops the thread and waits for it.
///    Dropping the watcher also signals the thread to stop.
///
/// Events go to the `mpsc::Sender` given at start. Once the watcher is gone
/// its sender clone is dropped, so the receiver ends when no other senders
/// remain.
pub struct FileWatcher {
    command_tx: mpsc::UnboundedSender<Command>,
    task_handle: Option<JoinHandle<()>>,
    roots: Arc<RwLock<RootSet>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("roots", &*self.roots.read())
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts watching every root in `roots`.
    ///
    /// Roots that cannot be subscribed are logged and skipped; the watcher
    /// starts as long as at least one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NoRoots`] if `roots` is empty, the last
    /// subscription error if every root failed, and [`WatchError::Notify`] if
    /// the backend cannot be created.
    pub async fn start(
        roots: RootSet,
        config: &WatchConfig,
        classifier: Arc<dyn PathClassifier>,
        events: mpsc::Sender<ChangeEvent>,
    ) -> Result<Self, WatchError> {
        if roots.is_empty() {
            return Err(WatchError::NoRoots);
        }

        let shared_roots = Arc::new(RwLock::new(RootSet::new()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        let task_roots = Arc::clone(&shared_roots);

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(
                roots, mode, task_roots, classifier, events, command_rx, ready_tx,
            );
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                command_tx,
                task_handle: Some(task_handle),
                roots: shared_roots,
            }),
            Ok(Err(error)) => {
                let _ = task_handle.await;
                Err(error)
            }
            Err(_) => Err(WatchError::ChannelClosed),
        }
    }

    /// Subscribes an additional root.
    ///
    /// Returns `Ok(false)` if the root is already watched.
    pub async fn watch(&self, root: Utf8PathBuf) -> Result<bool, WatchError> {
        if self.roots.read().contains(&root) {
            return Ok(false);
        }

        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Watch { root, reply })
            .map_err(|_| WatchError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WatchError::ChannelClosed)??;
        Ok(true)
    }

    /// Returns a snapshot of the roots currently subscribed.
    #[must_use]
    pub fn roots(&self) -> RootSet {
        self.roots.read().clone()
    }

    /// Returns `true` while the watcher thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the watcher thread and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelClosed`] if the thread panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        let _ = self.command_tx.send(Command::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle.await.map_err(|_| WatchError::ChannelClosed)?;
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // The thread exits on its own once it sees the command.
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

/// Runs the notify watcher in a blocking context until shut down.
#[allow(clippy::needless_pass_by_value)] // Owned values live for the whole thread
fn run_watcher_loop(
    initial: RootSet,
    mode: RecursiveMode,
    roots: Arc<RwLock<RootSet>>,
    classifier: Arc<dyn PathClassifier>,
    events: mpsc::Sender<ChangeEvent>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    ready_tx: oneshot::Sender<Result<(), WatchError>>,
) {
    let handler_roots = Arc::clone(&roots);
    let backend = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(event) => {
            for change in translate(&event, classifier.as_ref(), &handler_roots) {
                tracing::debug!(kind = %change.kind(), path = %change.path(), "File change");
                if events.blocking_send(change).is_err() {
                    tracing::trace!("Event receiver dropped, discarding change");
                    return;
                }
            }
        }
        Err(error) => tracing::warn!(error = %error, "Notify error"),
    });

    let mut backend = match backend {
        Ok(backend) => backend,
        Err(error) => {
            let _ = ready_tx.send(Err(error.into()));
            return;
        }
    };

    let mut last_error = None;
    for root in initial {
        match backend.watch(root.as_std_path(), mode) {
            Ok(()) => {
                tracing::info!(path = %root, "Monitoring path");
                roots.write().insert(root);
            }
            Err(error) => {
                tracing::warn!(path = %root, error = %error, "Cannot watch path, skipping");
                last_error = Some(WatchError::from(error));
            }
        }
    }

    let watched = roots.read().len();
    if watched == 0 {
        let _ = ready_tx.send(Err(last_error.unwrap_or(WatchError::NoRoots)));
        return;
    }
    let _ = ready_tx.send(Ok(()));
    tracing::info!(roots = watched, "File watcher started");

    while let Some(command) = command_rx.blocking_recv() {
        match command {
            Command::Watch { root, reply } => {
                let result = backend
                    .watch(root.as_std_path(), mode)
                    .map_err(WatchError::from);
                if result.is_ok() {
                    tracing::info!(path = %root, "Monitoring path");
                    roots.write().insert(root);
                }
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
    }

    drop(backend);
    tracing::info!("File watcher stopped");
}

/// Converts one raw notification into zero or more change events.
fn translate(
    event: &notify::Event,
    classifier: &dyn PathClassifier,
    roots: &RwLock<RootSet>,
) -> SmallVec<[ChangeEvent; 2]> {
    raw_changes(event)
        .into_iter()
        .filter_map(|(kind, path)| {
            let Some(path) = Utf8Path::from_path(path) else {
                tracing::warn!(path = %path.display(), "Skipping non-UTF-8 path in file event");
                return None;
            };
            build_change(kind, path, classifier, roots)
        })
        .collect()
}

/// Maps a raw notification onto change kinds, one per affected path.
fn raw_changes(event: &notify::Event) -> SmallVec<[(ChangeKind, &Path); 2]> {
    let kind = match event.kind {
        EventKind::Create(CreateKind::Folder)
        | EventKind::Remove(RemoveKind::Folder)
        | EventKind::Modify(ModifyKind::Metadata(_)) => return SmallVec::new(),
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            return match event.paths.as_slice() {
                [from, to, ..] => SmallVec::from_buf([
                    (ChangeKind::Deleted, from.as_path()),
                    (ChangeKind::Created, to.as_path()),
                ]),
                _ => SmallVec::new(),
            };
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Backends that cannot tell the two sides apart report one path.
            return event
                .paths
                .iter()
                .map(|path| {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    (kind, path.as_path())
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return SmallVec::new(),
    };

    event.paths.iter().map(|path| (kind, path.as_path())).collect()
}

fn build_change(
    kind: ChangeKind,
    path: &Utf8Path,
    classifier: &dyn PathClassifier,
    roots: &RwLock<RootSet>,
) -> Option<ChangeEvent> {
    if kind != ChangeKind::Deleted && path.is_dir() {
        return None;
    }

    let Classification::Relevant { language } = classifier.classify(path) else {
        tracing::trace!(path = %path, "Filtered out file event");
        return None;
    };

    let classified_at = SystemTime::now();
    let relative = roots.read().resolve(path);

    let change = match kind {
        ChangeKind::Created => ChangeEvent::created(relative, language, read_content(path)),
        ChangeKind::Modified => ChangeEvent::modified(relative, language, read_content(path)),
        ChangeKind::Deleted => ChangeEvent::deleted(relative),
    };
    Some(change.at(classified_at))
}

/// Reads a file as UTF-8 text, or returns an empty string.
fn read_content(path: &Utf8Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            tracing::debug!(path = %path, error = %error, "Unreadable file, sending empty content");
            String::new()
        }
    }
}
