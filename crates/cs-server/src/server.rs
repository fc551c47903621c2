//! TCP listener and the event pump.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cs_core::ServerConfig;
use cs_watcher::ChangeEvent;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::broadcaster::Broadcaster;
use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::scaffold::ProjectScaffolder;

/// A bound WebSocket listener.
///
/// Binding and serving are split so callers learn about bind failures (and
/// the actual port, when binding port 0) before anything else starts.
pub struct Server {
    listener: TcpListener,
    broadcaster: Broadcaster,
    scaffolder: Arc<dyn ProjectScaffolder>,
    send_timeout: Duration,
    shutdown: CancellationToken,
}

/// How long shutdown waits for connection tasks before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds the configured address and spawns the broadcaster.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        scaffolder: Arc<dyn ProjectScaffolder>,
        shutdown: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let local = listener.local_addr()?;
        tracing::info!(address = %local, "WebSocket server listening on ws://{local}");

        Ok(Self {
            listener,
            broadcaster: Broadcaster::spawn(config.client_queue_capacity),
            scaffolder,
            send_timeout: config.send_timeout(),
            shutdown,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle for publishing to this server's clients.
    pub fn broadcaster(&self) -> Broadcaster {
        self.broadcaster.clone()
    }

    /// Accepts connections until the shutdown token fires, then waits for
    /// every connection task to finish. Tasks that outlive the drain window
    /// are aborted.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            self.broadcaster.clone(),
                            Arc::clone(&self.scaffolder),
                            self.send_timeout,
                            self.shutdown.child_token(),
                        ));
                    }
                    Err(error) => tracing::warn!(error = %error, "Failed to accept connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(connections = connections.len(), "Shutting down server");
        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(connections = connections.len(), "Connections did not close in time, aborting");
            connections.shutdown().await;
        }
        Ok(())
    }
}

/// Forwards change events from the watcher to the broadcaster until the
/// event channel closes.
pub fn spawn_event_pump(
    mut events: mpsc::Receiver<ChangeEvent>,
    broadcaster: Broadcaster,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match broadcaster.publish(&event).await {
                Ok(()) => {}
                Err(ServerError::ChannelClosed) => break,
                Err(error) => tracing::warn!(path = %event.path(), error = %error, "Failed to publish event"),
            }
        }
        tracing::debug!("Event pump stopped");
    })
}
