//! Error types for the cs-server crate.

use camino::Utf8PathBuf;
use cs_core::ConfigError;
use cs_watcher::WatchError;
use tokio_tungstenite::tungstenite;

/// Errors raised while serving clients.
///
/// # Error Recovery Strategy
///
/// - **Bind** ([`ServerError::Bind`]): Fatal - the listener never started
/// - **Watch** ([`ServerError::Watch`]): Fatal - the watcher could not start
/// - **Config** ([`ServerError::Config`]): Fatal - invalid configuration
/// - **WebSocket / Io / Json** : Recoverable - only the affected connection ends
/// - **Send timeout** ([`ServerError::SendTimeout`]): Recoverable - the stalled client is dropped
/// - **Channel closed** ([`ServerError::ChannelClosed`]): Recoverable - the broadcaster is shutting down
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The `host:port` that was requested.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A WebSocket handshake or frame error.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// An I/O error on a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file watcher failed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// A frame could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A socket write did not complete within the configured bound.
    #[error("send to client timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    /// The broadcaster task has stopped.
    #[error("broadcaster channel closed")]
    ChannelClosed,

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<tungstenite::Error> for ServerError {
    fn from(error: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

impl ServerError {
    /// Returns `true` if the server cannot keep running after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Bind { .. } | Self::Config(_) | Self::Watch(_) => true,
            Self::WebSocket(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::SendTimeout(_)
            | Self::ChannelClosed => false,
        }
    }

    /// Returns `true` if only the affected connection or request is lost.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

/// Errors from project scaffolding. Reported to the requesting client.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    /// The project name cannot be used as a directory name.
    #[error("invalid project name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A directory or file could not be created.
    #[error("{path}: {source}")]
    Io {
        /// The path being created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ScaffoldError {
    pub(crate) fn invalid_name(name: &str, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.to_owned(),
            reason,
        }
    }

    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_bind_is_fatal() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8765".to_owned(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:8765"));
    }

    #[test]
    fn test_watch_errors_are_fatal() {
        assert!(ServerError::from(WatchError::NoRoots).is_fatal());
        assert!(ServerError::from(WatchError::ChannelClosed).is_fatal());
    }

    #[test]
    fn test_connection_errors_are_recoverable() {
        assert!(ServerError::from(tungstenite::Error::ConnectionClosed).is_recoverable());
        assert!(ServerError::ChannelClosed.is_recoverable());
        let timeout = ServerError::SendTimeout(std::time::Duration::from_millis(250));
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.to_string(), "send to client timed out after 250ms");
    }

    #[test]
    fn test_scaffold_error_display() {
        let err = ScaffoldError::invalid_name("../x", "must not contain path separators");
        assert_eq!(
            err.to_string(),
            r#"invalid project name "../x": must not contain path separators"#
        );
    }
}
