//! JSON wire protocol.
//!
//! Every frame is a JSON object with a `type` discriminator.
//!
//! # Client to server
//!
//! | `type`           | Fields   |
//! |------------------|----------|
//! | `create_project` | `name`   |
//!
//! # Server to client
//!
//! | `type`            | Fields                                     | Sent to      |
//! |-------------------|--------------------------------------------|--------------|
//! | `file_created`    | `path`, `language`, `content`, `timestamp` | every client |
//! | `file_modified`   | `path`, `language`, `content`, `timestamp` | every client |
//! | `file_deleted`    | `path`, `timestamp`                        | every client |
//! | `project_created` | `name`, `path`                             | requester    |
//! | `error`           | `message`                                  | requester    |

use camino::Utf8PathBuf;
use cs_watcher::{ChangeEvent, ChangeKind};
use serde::{Deserialize, Serialize};

/// A request decoded from a client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Scaffold a new project in the workspace directory.
    CreateProject {
        /// Project directory name.
        name: String,
    },

    /// Any well-formed message with a `type` this server does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decodes a text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A frame sent from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A relevant file appeared.
    FileCreated {
        /// Path relative to its watched root.
        path: Utf8PathBuf,
        /// Language tag.
        language: String,
        /// File content, empty if unreadable.
        content: String,
        /// Seconds since the Unix epoch.
        timestamp: f64,
    },

    /// A relevant file was written.
    FileModified {
        /// Path relative to its watched root.
        path: Utf8PathBuf,
        /// Language tag.
        language: String,
        /// File content, empty if unreadable.
        content: String,
        /// Seconds since the Unix epoch.
        timestamp: f64,
    },

    /// A relevant file disappeared.
    FileDeleted {
        /// Path relative to its watched root.
        path: Utf8PathBuf,
        /// Seconds since the Unix epoch.
        timestamp: f64,
    },

    /// Reply to a successful `create_project`.
    ProjectCreated {
        /// Requested project name.
        name: String,
        /// Directory the project lives in.
        path: Utf8PathBuf,
    },

    /// Reply to a request that could not be served.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// Builds an [`ServerMessage::Error`] reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the frame as JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&ChangeEvent> for ServerMessage {
    fn from(event: &ChangeEvent) -> Self {
        let path = event.path().to_owned();
        let timestamp = event.timestamp_secs();
        let language = event.language().unwrap_or_default().to_owned();
        let content = event.content().unwrap_or_default().to_owned();

        match event.kind() {
            ChangeKind::Created => Self::FileCreated {
                path,
                language,
                content,
                timestamp,
            },
            ChangeKind::Modified => Self::FileModified {
                path,
                language,
                content,
                timestamp,
            },
            ChangeKind::Deleted => Self::FileDeleted { path, timestamp },
        }
    }
}
