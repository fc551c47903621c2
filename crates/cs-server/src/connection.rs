//! Per-connection task.
//!
//! Each accepted socket is upgraded to a WebSocket, registered with the
//! [`Broadcaster`], and then served by one loop that multiplexes three
//! sources:
//!
//! - shutdown: send a close frame and stop
//! - the client's broadcast queue: forward frames in order
//! - the socket: decode requests and reply to this client only
//!
//! The client is unregistered however the loop ends.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::broadcaster::{Broadcaster, Subscription};
use crate::error::ServerError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::scaffold::ProjectScaffolder;

type Sink = SplitSink<WebSocketStream<TcpStream>, Message>;
type Source = SplitStream<WebSocketStream<TcpStream>>;

/// Upper bound on the best-effort close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serves one client until it disconnects, is dropped by the broadcaster, or
/// `shutdown` fires.
///
/// Every socket write is bounded by `send_timeout` and abandoned when
/// `shutdown` fires, so a client that stops reading cannot pin this task.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broadcaster: Broadcaster,
    scaffolder: Arc<dyn ProjectScaffolder>,
    send_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let mut subscription = broadcaster.register().await?;
    let id = subscription.id();
    tracing::debug!(client = %id, peer = %peer, "WebSocket handshake complete");

    let (sink, source) = socket.split();
    let mut writer = Writer {
        sink,
        send_timeout,
        shutdown: &shutdown,
    };
    let result = serve(&mut writer, source, &mut subscription, &scaffolder).await;

    broadcaster.unregister(id).await;
    match &result {
        Ok(()) => {}
        Err(ServerError::SendTimeout(after)) => {
            tracing::warn!(client = %id, timeout = ?after, "Client stopped reading, dropping connection");
        }
        Err(error) => tracing::debug!(client = %id, error = %error, "Connection ended with error"),
    }
    result
}

/// Result of a bounded write.
enum Sent {
    Delivered,
    Cancelled,
}

/// The outbound half of a connection.
struct Writer<'a> {
    sink: Sink,
    send_timeout: Duration,
    shutdown: &'a CancellationToken,
}

impl Writer<'_> {
    async fn send(&mut self, message: Message) -> Result<Sent, ServerError> {
        tokio::select! {
            () = self.shutdown.cancelled() => Ok(Sent::Cancelled),
            sent = tokio::time::timeout(self.send_timeout, self.sink.send(message)) => match sent {
                Ok(result) => result.map(|()| Sent::Delivered).map_err(ServerError::from),
                Err(_) => Err(ServerError::SendTimeout(self.send_timeout)),
            },
        }
    }

    async fn close(&mut self) {
        let bound = self.send_timeout.min(CLOSE_TIMEOUT);
        let _ = tokio::time::timeout(bound, self.sink.send(Message::Close(None))).await;
    }
}

async fn serve(
    writer: &mut Writer<'_>,
    mut source: Source,
    subscription: &mut Subscription,
    scaffolder: &Arc<dyn ProjectScaffolder>,
) -> Result<(), ServerError> {
    loop {
        let outgoing = tokio::select! {
            () = writer.shutdown.cancelled() => {
                writer.close().await;
                return Ok(());
            }
            outbound = subscription.recv() => match outbound {
                Some(frame) => Message::Text(frame.to_string()),
                None => {
                    tracing::debug!(client = %subscription.id(), "Dropped by broadcaster, closing");
                    writer.close().await;
                    return Ok(());
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => reply(dispatch(&text, scaffolder).await)?,
                Some(Ok(Message::Binary(bytes))) => {
                    let message = match std::str::from_utf8(&bytes) {
                        Ok(text) => dispatch(text, scaffolder).await,
                        Err(_) => {
                            tracing::warn!("Binary frame is not UTF-8");
                            ServerMessage::error("malformed message: payload is not UTF-8")
                        }
                    };
                    reply(message)?
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(error.into()),
            },
        };

        if let Sent::Cancelled = writer.send(outgoing).await? {
            return Ok(());
        }
    }
}

fn reply(message: ServerMessage) -> Result<Message, ServerError> {
    Ok(Message::Text(message.to_json()?))
}

/// Decodes one request and produces the reply for its sender.
async fn dispatch(text: &str, scaffolder: &Arc<dyn ProjectScaffolder>) -> ServerMessage {
    match ClientMessage::decode(text) {
        Ok(ClientMessage::CreateProject { name }) => {
            create_project(name, Arc::clone(scaffolder)).await
        }
        Ok(ClientMessage::Unknown) => {
            tracing::warn!("Unknown message type");
            ServerMessage::error("unknown message type")
        }
        Err(error) => {
            tracing::warn!(error = %error, "Malformed message");
            ServerMessage::error(format!("malformed message: {error}"))
        }
    }
}

async fn create_project(name: String, scaffolder: Arc<dyn ProjectScaffolder>) -> ServerMessage {
    let requested = name.clone();
    let result = tokio::task::spawn_blocking(move || scaffolder.create_project(&requested)).await;

    match result {
        Ok(Ok(path)) => ServerMessage::ProjectCreated { name, path },
        Ok(Err(error)) => {
            tracing::error!(name = %name, error = %error, "Error creating project");
            ServerMessage::error(format!("Failed to create project: {error}"))
        }
        Err(error) => {
            tracing::error!(name = %name, error = %error, "Scaffolding task failed");
            ServerMessage::error(format!("Failed to create project: {error}"))
        }
    }
}
