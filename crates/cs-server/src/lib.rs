//! WebSocket server that streams file changes to connected clients.
//!
//! # Overview
//!
//! - [`protocol`]: JSON frames in both directions
//! - [`broadcaster`]: the actor that owns the active client set
//! - [`connection`]: one task per client
//! - [`scaffold`]: `create_project` requests
//! - [`server`]: the listener and the watcher-to-broadcaster pump
//!
//! # Architecture
//!
//! ```text
//! MonitorSession ──ChangeEvent──► event pump ──publish──► Broadcaster actor
//!                                                              │ bounded queue per client
//!                      TcpListener ──accept──► connection ◄────┘
//!                                                  │  ▲
//!                               create_project ────┘  └──── project_created / error
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! cs-cli ──► cs-server ──► cs-watcher ──► cs-core
//!                     └─────────────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod broadcaster;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod scaffold;
pub mod server;

use std::sync::Arc;

use cs_core::Config;
use cs_watcher::MonitorSession;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use broadcaster::{Broadcaster, ClientId, Subscription};
pub use error::{ScaffoldError, ServerError};
pub use protocol::{ClientMessage, ServerMessage};
pub use scaffold::{FsScaffolder, ProjectScaffolder};
pub use server::{Server, spawn_event_pump};

/// Runs the watcher and the server until `shutdown` fires.
///
/// Startup is all-or-nothing: if the listener cannot bind or no root can be
/// watched, the error is returned before any client is served.
///
/// # Errors
///
/// Returns [`ServerError::Config`], [`ServerError::Bind`] or
/// [`ServerError::Watch`] on startup failure.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), ServerError> {
    config.validate()?;

    let scaffolder = FsScaffolder::from_config(&config.scaffold);
    tracing::info!(workspace = %scaffolder.workspace(), "Projects are created under workspace");
    let server = Server::bind(&config.server, Arc::new(scaffolder), shutdown.clone()).await?;

    let (tx, rx) = mpsc::channel(config.watch.event_channel_capacity);
    let mut session = MonitorSession::new(config.monitor.clone(), config.watch);
    session.start(&config.monitor.paths, tx).await?;

    let pump = spawn_event_pump(rx, server.broadcaster());
    let result = server.run().await;

    session.stop().await;
    if let Err(error) = pump.await {
        tracing::warn!(error = %error, "Event pump task failed");
    }
    tracing::info!("Shutdown complete");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::{Utf8Path, Utf8PathBuf};
    use cs_core::{MonitorConfig, ScaffoldConfig, ServerConfig};
    use futures_util::{SinkExt, StreamExt};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    fn config(paths: Vec<Utf8PathBuf>, workspace: &Utf8Path) -> Config {
        Config {
            monitor: MonitorConfig {
                paths,
                include_default_dirs: false,
                ..MonitorConfig::default()
            },
            server: ServerConfig {
                port: 0,
                ..ServerConfig::default()
            },
            scaffold: ScaffoldConfig {
                workspace_dir: Some(workspace.to_owned()),
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_run_fails_fast_without_roots() {
        let dir = TempDir::new().unwrap();
        let workspace = Utf8Path::from_path(dir.path()).unwrap();
        let config = config(vec![workspace.join("missing")], workspace);

        let err = run(config, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Watch(cs_watcher::WatchError::NoRoots)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let workspace = Utf8Path::from_path(dir.path()).unwrap();
        let mut config = config(vec![workspace.to_owned()], workspace);
        config.server.client_queue_capacity = 0;

        let err = run(config, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let workspace = Utf8Path::from_path(dir.path()).unwrap();
        let config = config(vec![workspace.to_owned()], workspace);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(config, shutdown.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        shutdown.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("run did not stop")
            .unwrap()
            .unwrap();
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// Connects once the listener is up and the connection is being served.
    async fn connect_served(addr: &str) -> Client {
        let mut client = tokio::time::timeout(FRAME_TIMEOUT, async {
            loop {
                if let Ok((client, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await {
                    return client;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("Server never accepted a connection");

        client
            .send(Message::Text(r#"{"type":"create_project","name":"ready"}"#.to_owned()))
            .await
            .unwrap();
        assert!(matches!(
            next_message(&mut client).await,
            ServerMessage::ProjectCreated { .. }
        ));
        client
    }

    async fn next_message(client: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(FRAME_TIMEOUT, client.next())
                .await
                .expect("Timed out waiting for frame")
                .expect("Connection closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_file_lifecycle_reaches_every_client_in_order() {
        let dir = TempDir::new().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        let watched = base.join("watched");
        std::fs::create_dir(&watched).unwrap();
        let mut config = config(vec![watched.clone()], &base.join("projects"));
        config.server.port = free_port();
        let addr = config.server.address();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(config, shutdown.clone()));
        let mut clients = [connect_served(&addr).await, connect_served(&addr).await];

        let file = watched.join("e2e.py");
        let mut handle = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file)
            .unwrap();
        drop(handle);
        tokio::time::sleep(Duration::from_millis(200)).await;

        handle = std::fs::OpenOptions::new().append(true).open(&file).unwrap();
        handle.write_all(b"x=1\n").unwrap();
        drop(handle);
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::remove_file(&file).unwrap();

        for client in &mut clients {
            let ServerMessage::FileCreated { path, language, timestamp: created, .. } =
                next_message(client).await
            else {
                unreachable!("expected file_created");
            };
            assert_eq!(path, "e2e.py");
            assert_eq!(language, "python");

            let ServerMessage::FileModified { path, content, timestamp: modified, .. } =
                next_message(client).await
            else {
                unreachable!("expected file_modified");
            };
            assert_eq!(path, "e2e.py");
            assert_eq!(content, "x=1\n");

            let ServerMessage::FileDeleted { path, timestamp: deleted } = next_message(client).await
            else {
                unreachable!("expected file_deleted");
            };
            assert_eq!(path, "e2e.py");
            assert!(created <= modified && modified <= deleted);

            let extra = tokio::time::timeout(Duration::from_millis(300), client.next()).await;
            assert!(extra.is_err(), "unexpected frame {extra:?}");
        }

        shutdown.cancel();
        tokio::time::timeout(FRAME_TIMEOUT, task)
            .await
            .expect("run did not stop")
            .unwrap()
            .unwrap();
    }
}
