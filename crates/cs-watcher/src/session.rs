//! Session-level control over the watched root set.
//!
//! A [`MonitorSession`] owns at most one [`FileWatcher`] at a time and the
//! sender its events flow into. It decides which roots are watched: the
//! caller's explicit paths, plus the default development directories when the
//! configuration asks for them.
//!
//! # State Machine
//!
//! ```text
//!            start                 add_path / remove_path (>= 1 root left)
//! Stopped ─────────► Running ◄──────────────────────────┐
//!    ▲                  │ └──────────────────────────────┘
//!    │   stop, or       │
//!    └──────────────────┘
//!      remove_path leaving no roots
//! ```

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use cs_core::{MonitorConfig, WatchConfig};
use tokio::sync::mpsc;

use crate::classify::{ClassificationRules, PathClassifier};
use crate::defaults::default_dev_directories;
use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::roots::{RootSet, normalize_root};
use crate::watcher::FileWatcher;

/// Whether a session currently has a live watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No watcher; no events are produced.
    Stopped,
    /// A watcher is running over at least one root.
    Running,
}

/// The watcher plus the sender it was started with.
struct Active {
    watcher: FileWatcher,
    events: mpsc::Sender<ChangeEvent>,
}

/// Owns the watched root set and the watcher built over it.
///
/// # Examples
///
/// ```no_run
/// use cs_core::{MonitorConfig, WatchConfig};
/// use cs_watcher::MonitorSession;
/// use camino::Utf8PathBuf;
/// use tokio::sync::mpsc;
///
/// # async fn example() -> Result<(), cs_watcher::WatchError> {
/// let (tx, mut rx) = mpsc::channel(1024);
/// let mut session = MonitorSession::new(MonitorConfig::default(), WatchConfig::default());
/// session.start(&[Utf8PathBuf::from("/home/dev/code")], tx).await?;
///
/// while let Some(event) = rx.recv().await {
///     println!("{} {}", event.kind(), event.path());
/// }
/// # Ok(())
/// # }
/// ```
pub struct MonitorSession {
    config: MonitorConfig,
    watch: WatchConfig,
    classifier: Arc<dyn PathClassifier>,
    active: Option<Active>,
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("state", &self.state())
            .field("roots", &self.watched_roots())
            .finish_non_exhaustive()
    }
}

impl MonitorSession {
    /// Creates a stopped session that classifies with rules built from
    /// `config`.
    #[must_use]
    pub fn new(config: MonitorConfig, watch: WatchConfig) -> Self {
        let classifier = Arc::new(ClassificationRules::from_config(&config));
        Self::with_classifier(config, watch, classifier)
    }

    /// Creates a stopped session with a caller-supplied classifier.
    #[must_use]
    pub fn with_classifier(
        config: MonitorConfig,
        watch: WatchConfig,
        classifier: Arc<dyn PathClassifier>,
    ) -> Self {
        Self {
            config,
            watch,
            classifier,
            active: None,
        }
    }

    /// Starts watching `explicit` paths, plus the default development
    /// directories when enabled. A running session is stopped first.
    ///
    /// Paths that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NoRoots`] if no path survives filtering, or the
    /// watcher's startup error.
    pub async fn start(
        &mut self,
        explicit: &[Utf8PathBuf],
        events: mpsc::Sender<ChangeEvent>,
    ) -> Result<(), WatchError> {
        self.stop().await;

        let mut candidates = explicit.to_vec();
        if self.config.include_default_dirs {
            candidates.extend(default_dev_directories());
        }

        let roots = collect_roots(&candidates);
        self.launch(roots, events).await
    }

    /// Stops the watcher and forgets every root. Calling it twice is harmless.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        if let Err(error) = active.watcher.shutdown().await {
            tracing::warn!(error = %error, "Watcher did not shut down cleanly");
        }
        tracing::info!("Monitor session stopped");
    }

    /// Adds a root to a running session.
    ///
    /// Returns `Ok(false)` if the session is stopped, the path does not
    /// exist, or it is already watched.
    pub async fn add_path(&mut self, path: &Utf8Path) -> Result<bool, WatchError> {
        let Some(active) = &self.active else {
            tracing::debug!(path = %path, "Session stopped, ignoring add");
            return Ok(false);
        };
        let Some(root) = normalize_root(path) else {
            tracing::info!(path = %path, "Path does not exist, not adding");
            return Ok(false);
        };

        active.watcher.watch(root).await
    }

    /// Removes a root, rebuilding the watcher over what remains.
    ///
    /// When the last root is removed the session ends up stopped. Default
    /// directories are not re-added by the rebuild.
    ///
    /// Returns `Ok(false)` if the path was not watched.
    pub async fn remove_path(&mut self, path: &Utf8Path) -> Result<bool, WatchError> {
        let Some(active) = &self.active else {
            return Ok(false);
        };

        let target = normalize_root(path).unwrap_or_else(|| path.to_owned());
        let mut roots = active.watcher.roots();
        if !roots.remove(&target) {
            return Ok(false);
        }

        let events = active.events.clone();
        self.stop().await;

        if roots.is_empty() {
            tracing::info!(path = %target, "Last root removed");
            return Ok(true);
        }

        self.launch(roots, events).await?;
        Ok(true)
    }

    /// Returns `true` while a watcher is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.watcher.is_running())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_running() {
            SessionState::Running
        } else {
            SessionState::Stopped
        }
    }

    /// Roots currently being watched. Empty when stopped.
    #[must_use]
    pub fn watched_roots(&self) -> RootSet {
        self.active
            .as_ref()
            .map(|active| active.watcher.roots())
            .unwrap_or_default()
    }

    async fn launch(
        &mut self,
        roots: RootSet,
        events: mpsc::Sender<ChangeEvent>,
    ) -> Result<(), WatchError> {
        if roots.is_empty() {
            return Err(WatchError::NoRoots);
        }

        let watcher = FileWatcher::start(
            roots,
            &self.watch,
            Arc::clone(&self.classifier),
            events.clone(),
        )
        .await?;

        tracing::info!(roots = watcher.roots().len(), "Monitor session running");
        self.active = Some(Active { watcher, events });
        Ok(())
    }
}

/// Normalizes and deduplicates candidate roots, skipping missing ones.
fn collect_roots(candidates: &[Utf8PathBuf]) -> RootSet {
    candidates
        .iter()
        .filter_map(|candidate| {
            let root = normalize_root(candidate);
            if root.is_none() {
                tracing::info!(path = %candidate, "Path does not exist, skipping");
            }
            root
        })
        .collect()
}
