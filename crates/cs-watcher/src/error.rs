//! Error types for the cs-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while starting, extending, or stopping a watch.

/// Errors that can occur during file watching operations.
///
/// Per-file problems (unreadable content, non-UTF-8 paths) never surface as
/// errors; they are logged on the notification thread and the pipeline keeps
/// going. Missing roots are skipped with a log line as well. What reaches the
/// caller is about the watch itself.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): Fatal at startup. From
///   [`FileWatcher::watch`](crate::FileWatcher::watch) only the new root is
///   lost and the running watch continues
/// - **No roots** ([`WatchError::NoRoots`]): Fatal - nothing to watch
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - the watcher thread is gone
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The effective root set was empty, or no root could be subscribed.
    #[error("no watchable root directories")]
    NoRoots,

    /// The watcher thread stopped or its command channel closed.
    #[error("watcher channel closed unexpectedly")]
    ChannelClosed,
}
