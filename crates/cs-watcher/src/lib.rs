//! Filesystem change detection for codestream.
//!
//! This crate turns raw `notify` notifications over a set of root directories
//! into classified [`ChangeEvent`]s delivered on a tokio channel.
//!
//! # Overview
//!
//! - [`classify`]: decides whether a path is relevant and which language it is
//! - [`events`]: the normalized [`ChangeEvent`] type
//! - [`roots`]: the watched [`RootSet`] and relative path resolution
//! - [`watcher`]: [`FileWatcher`], the notify bridge
//! - [`session`]: [`MonitorSession`], which decides what gets watched
//! - [`defaults`]: common development directories under the home directory
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Notification Thread (notify)                    │
//! │  ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐   │
//! │  │ raw event    │ ->│ PathClassifier │ ->│ read + relative  │   │
//! │  │ kind mapping │   │ (relevant?)    │   │ path resolution  │   │
//! │  └──────────────┘   └────────────────┘   └────────┬─────────┘   │
//! └───────────────────────────────────────────────────│─────────────┘
//!                                       blocking_send │
//!                                                     ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌──────────────────────┐               │
//! │  │ MonitorSession   │    │ mpsc::Receiver       │ -> consumer   │
//! │  │ (start/stop)     │    │ <ChangeEvent>        │               │
//! │  └──────────────────┘    └──────────────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use cs_core::{MonitorConfig, WatchConfig};
//! use cs_watcher::MonitorSession;
//! use camino::Utf8PathBuf;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watch = WatchConfig::default();
//!     let (tx, mut rx) = mpsc::channel(watch.event_channel_capacity);
//!
//!     let mut session = MonitorSession::new(MonitorConfig::default(), watch);
//!     session.start(&[Utf8PathBuf::from("/path/to/project")], tx).await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("{} {} ({:?})", event.kind(), event.path(), event.language());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod classify;
pub mod defaults;
pub mod error;
pub mod events;
pub mod roots;
pub mod session;
pub mod watcher;

pub use classify::{Classification, ClassificationRules, PathClassifier};
pub use defaults::default_dev_directories;
pub use error::WatchError;
pub use events::{ChangeEvent, ChangeKind};
pub use roots::{RootSet, normalize_root};
pub use session::{MonitorSession, SessionState};
pub use watcher::FileWatcher;
