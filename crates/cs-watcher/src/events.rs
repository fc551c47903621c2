//! Normalized change events.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (raw, absolute paths)
//!        │
//!        ▼
//!   kind mapping + directory skip
//!        │
//!        ▼
//!   PathClassifier (relevant? language?)
//!        │
//!        ▼
//!   ChangeEvent (relative path, language, content, timestamp)
//!        │
//!        ▼
//!   mpsc channel to the session owner
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The file appeared (created, or renamed into place).
    Created,
    /// The file's content was written.
    Modified,
    /// The file disappeared (deleted, or renamed away).
    Deleted,
}

impl ChangeKind {
    /// Returns a lowercase label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified file change, ready to be published.
///
/// Created and modified events carry the file's language and its content at
/// the time the notification was handled. Deleted events carry neither.
/// Events are immutable once built.
///
/// # Examples
///
/// ```
/// use cs_watcher::{ChangeEvent, ChangeKind};
/// use camino::Utf8PathBuf;
///
/// let event = ChangeEvent::modified(Utf8PathBuf::from("src/lib.rs"), "rust".into(), "fn main() {}".into());
/// assert_eq!(event.kind(), ChangeKind::Modified);
/// assert_eq!(event.language(), Some("rust"));
///
/// let gone = ChangeEvent::deleted(Utf8PathBuf::from("src/old.rs"));
/// assert!(gone.content().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    kind: ChangeKind,
    path: Utf8PathBuf,
    language: Option<Arc<str>>,
    content: Option<String>,
    timestamp: SystemTime,
}

impl ChangeEvent {
    /// Creates a [`ChangeKind::Created`] event stamped now.
    #[must_use]
    pub fn created(path: Utf8PathBuf, language: Arc<str>, content: String) -> Self {
        Self::with_content(ChangeKind::Created, path, language, content)
    }

    /// Creates a [`ChangeKind::Modified`] event stamped now.
    #[must_use]
    pub fn modified(path: Utf8PathBuf, language: Arc<str>, content: String) -> Self {
        Self::with_content(ChangeKind::Modified, path, language, content)
    }

    /// Creates a [`ChangeKind::Deleted`] event stamped now.
    #[must_use]
    pub fn deleted(path: Utf8PathBuf) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path,
            language: None,
            content: None,
            timestamp: SystemTime::now(),
        }
    }

    fn with_content(kind: ChangeKind, path: Utf8PathBuf, language: Arc<str>, content: String) -> Self {
        Self {
            kind,
            path,
            language: Some(language),
            content: Some(content),
            timestamp: SystemTime::now(),
        }
    }

    /// Replaces the timestamp. Useful for tests and replays.
    #[must_use]
    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The kind of change.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Path relative to the watched root that contains the file, or the
    /// absolute path when no root matched.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Language tag, absent for deletions.
    #[inline]
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// File content, absent for deletions. Empty when the file could not be
    /// read as UTF-8 text.
    #[inline]
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Wall-clock time the event was classified.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Seconds since the Unix epoch, fractional.
    #[must_use]
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |elapsed| elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_created_carries_language_and_content() {
        let event = ChangeEvent::created(
            Utf8PathBuf::from("pkg/mod.py"),
            Arc::from("python"),
            "print(1)\n".to_owned(),
        );
        assert_eq!(event.kind(), ChangeKind::Created);
        assert_eq!(event.path(), Utf8Path::new("pkg/mod.py"));
        assert_eq!(event.language(), Some("python"));
        assert_eq!(event.content(), Some("print(1)\n"));
    }

    #[test]
    fn test_deleted_has_no_payload() {
        let event = ChangeEvent::deleted(Utf8PathBuf::from("gone.rs"));
        assert_eq!(event.kind(), ChangeKind::Deleted);
        assert!(event.language().is_none());
        assert!(event.content().is_none());
    }

    #[test]
    fn test_timestamp_secs() {
        let event = ChangeEvent::deleted(Utf8PathBuf::from("a.rs"))
            .at(UNIX_EPOCH + Duration::from_millis(1_500));
        assert!((event.timestamp_secs() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_timestamps_are_non_decreasing() {
        let first = ChangeEvent::deleted(Utf8PathBuf::from("a.rs"));
        let second = ChangeEvent::deleted(Utf8PathBuf::from("a.rs"));
        assert!(second.timestamp_secs() >= first.timestamp_secs());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ChangeKind::Created.to_string(), "created");
        assert_eq!(ChangeKind::Modified.to_string(), "modified");
        assert_eq!(ChangeKind::Deleted.to_string(), "deleted");
    }
}
