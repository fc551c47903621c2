//! Fan-out of change events to connected clients.
//!
//! A single actor task owns the set of active clients. Registration,
//! unregistration, publishing and queries are all commands on one channel,
//! so every publish pass sees a consistent snapshot and prunes its failures
//! before the next command runs.
//!
//! ```text
//!  Broadcaster (clone) ──┐
//!  Broadcaster (clone) ──┼─► command channel ─► actor ─┬─► client queue ─► connection task
//!  Broadcaster (clone) ──┘                             ├─► client queue ─► connection task
//!                                                      └─► client queue ─► connection task
//! ```
//!
//! Each client has a bounded outbound queue. A client whose queue is full or
//! whose receiver is gone is removed at the end of the publish pass; dropping
//! its sender ends the connection's subscription, which closes the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cs_watcher::ChangeEvent;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::error::ServerError;
use crate::protocol::ServerMessage;

const COMMAND_CAPACITY: usize = 1024;

/// Identifies one registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The receiving end of one client's outbound queue.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    receiver: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    /// The client this subscription belongs to.
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next serialized frame.
    ///
    /// Returns `None` once the client has been removed and its queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }
}

enum Command {
    Register {
        id: ClientId,
        outbound: mpsc::Sender<Arc<str>>,
    },
    Unregister {
        id: ClientId,
    },
    Publish {
        payload: Arc<str>,
    },
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the broadcast actor. Cheap to clone.
///
/// The actor runs until every handle is dropped.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register { id, .. } => write!(f, "Register({id})"),
            Self::Unregister { id } => write!(f, "Unregister({id})"),
            Self::Publish { payload } => write!(f, "Publish({} bytes)", payload.len()),
            Self::ClientCount { .. } => f.write_str("ClientCount"),
        }
    }
}

impl Broadcaster {
    /// Spawns the actor on the current runtime.
    ///
    /// `queue_capacity` bounds each client's outbound queue; a value of zero
    /// is treated as one.
    pub fn spawn(queue_capacity: usize) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        tokio::spawn(run_actor(command_rx));

        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Adds a client to the active set.
    pub async fn register(&self) -> Result<Subscription, ServerError> {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, receiver) = mpsc::channel(self.queue_capacity);

        self.send(Command::Register { id, outbound }).await?;
        Ok(Subscription { id, receiver })
    }

    /// Removes a client. Removing an unknown or already removed client is a
    /// no-op.
    pub async fn unregister(&self, id: ClientId) {
        let _ = self.send(Command::Unregister { id }).await;
    }

    /// Serializes `event` once and queues it for every active client.
    ///
    /// Per-client delivery failures never surface here.
    pub async fn publish(&self, event: &ChangeEvent) -> Result<(), ServerError> {
        let payload = ServerMessage::from(event).to_json()?;
        self.send(Command::Publish {
            payload: Arc::from(payload),
        })
        .await
    }

    /// Number of clients in the active set.
    pub async fn client_count(&self) -> Result<usize, ServerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(Command::ClientCount { reply }).await?;
        reply_rx.await.map_err(|_| ServerError::ChannelClosed)
    }

    async fn send(&self, command: Command) -> Result<(), ServerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServerError::ChannelClosed)
    }
}

async fn run_actor(mut commands: mpsc::Receiver<Command>) {
    let mut clients: FxHashMap<ClientId, mpsc::Sender<Arc<str>>> = FxHashMap::default();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register { id, outbound } => {
                clients.insert(id, outbound);
                tracing::info!(client = %id, clients = clients.len(), "Client connected");
            }
            Command::Unregister { id } => {
                if clients.remove(&id).is_some() {
                    tracing::info!(client = %id, clients = clients.len(), "Client disconnected");
                }
            }
            Command::Publish { payload } => deliver(&mut clients, &payload),
            Command::ClientCount { reply } => {
                let _ = reply.send(clients.len());
            }
        }
    }

    tracing::debug!("Broadcaster stopped");
}

fn deliver(clients: &mut FxHashMap<ClientId, mpsc::Sender<Arc<str>>>, payload: &Arc<str>) {
    if clients.is_empty() {
        return;
    }

    let mut failed: SmallVec<[ClientId; 4]> = SmallVec::new();
    for (id, outbound) in clients.iter() {
        match outbound.try_send(Arc::clone(payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(client = %id, "Client queue full, disconnecting");
                failed.push(*id);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client = %id, "Client gone");
                failed.push(*id);
            }
        }
    }

    for id in &failed {
        clients.remove(id);
    }
    if !failed.is_empty() {
        tracing::info!(pruned = failed.len(), clients = clients.len(), "Pruned clients");
    }
}
