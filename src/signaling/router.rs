use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tracing::{debug, error, info};

use super::directory::RoomDirectory;
use super::messages::{ClientMessage, ServerMessage};
use super::registry::ClientRegistry;
use super::types::{ClientId, OutboundMessage, RoomName, SignalingError};

/// Snapshot of registry and directory sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub clients: usize,
    pub rooms: usize,
}

/// Protocol state machine over the client registry and room directory.
///
/// Every method runs to completion without suspending: outbound delivery is
/// a push onto the recipient's unbounded channel. Whoever owns the `Router`
/// owns all mutation, so each call observes and leaves a consistent state.
/// Per-message failures are terminated here, either as an `error` reply or a
/// silent drop.
pub struct Router {
    registry: ClientRegistry,
    directory: RoomDirectory,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            registry: ClientRegistry::new(),
            directory: RoomDirectory::new(),
        }
    }

    /// Register a connection and queue its `id` notification ahead of
    /// anything else it will receive.
    pub fn connect(&mut self, tx: mpsc::UnboundedSender<OutboundMessage>) -> ClientId {
        let id = self.registry.register(tx);
        info!("Client {} connected", id);
        self.send(id, &ServerMessage::Id { id });
        id
    }

    /// Implicit leave, then removal from the registry. Idempotent.
    pub fn disconnect(&mut self, id: ClientId) {
        self.leave(id);
        if self.registry.remove(id).is_some() {
            info!("Client {} disconnected", id);
        }
    }

    /// Decode and route one inbound text frame from `id`.
    pub fn handle_text(&mut self, id: ClientId, text: Utf8Bytes) {
        if self.registry.lookup(id).is_none() {
            debug!("Dropping message from unknown client {}", id);
            return;
        }

        let msg = match ClientMessage::decode(&text) {
            Ok(m) => m,
            Err(e) => {
                debug!("Dropping malformed message from {}: {}", id, e);
                return;
            }
        };

        match msg {
            ClientMessage::Create { room } => self.create(id, room),
            ClientMessage::Join { room } => self.join(id, room),
            ClientMessage::Leave => self.leave(id),
            ClientMessage::Offer { to }
            | ClientMessage::Answer { to }
            | ClientMessage::IceCandidate { to } => self.relay(id, to, text),
            ClientMessage::Unknown => {
                debug!("Dropping message of unknown type from {}", id);
            }
        }
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            clients: self.registry.len(),
            rooms: self.directory.len(),
        }
    }

    fn create(&mut self, id: ClientId, room: RoomName) {
        let Some(entry) = self.registry.lookup(id) else {
            return;
        };

        if entry.room() != Some(&room) {
            self.leave(id);
            self.directory.add_member(&room, id);
            self.registry.set_room(id, Some(room.clone()));
            info!("Client {} created room {}", id, room);
        }

        self.send(id, &ServerMessage::Created { room });
    }

    /// The joiner's `joined` is queued before any member's `new-peer`, and
    /// both use the member snapshot taken before the joiner is added.
    fn join(&mut self, id: ClientId, room: RoomName) {
        let Some(entry) = self.registry.lookup(id) else {
            return;
        };
        let already_member = entry.room() == Some(&room);

        if self.directory.lookup(&room).is_none() {
            debug!("Client {} tried to join missing room {}", id, room);
            let err = SignalingError::RoomNotFound(room);
            self.send(id, &ServerMessage::from(&err));
            return;
        }

        if !already_member {
            self.leave(id);
        }

        let peers: Vec<ClientId> = self
            .directory
            .members(&room)
            .into_iter()
            .filter(|peer| *peer != id)
            .collect();

        self.send(
            id,
            &ServerMessage::Joined {
                room: room.clone(),
                peers: peers.clone(),
            },
        );

        if already_member {
            return;
        }

        self.broadcast(&peers, &ServerMessage::NewPeer { peer_id: id });
        self.directory.add_member(&room, id);
        self.registry.set_room(id, Some(room.clone()));
        info!("Client {} joined room {}", id, room);
    }

    fn leave(&mut self, id: ClientId) {
        let Some(room) = self.registry.lookup(id).and_then(|e| e.room().cloned()) else {
            return;
        };

        self.directory.remove_member(&room, id);
        self.registry.set_room(id, None);

        let remaining = self.directory.members(&room);
        self.broadcast(&remaining, &ServerMessage::PeerLeft { peer_id: id });
        info!("Client {} left room {}", id, room);
    }

    /// Forward the original frame untouched. Unknown targets are dropped
    /// without telling the sender.
    fn relay(&self, from: ClientId, to: Option<ClientId>, text: Utf8Bytes) {
        let Some(to) = to else {
            debug!("Dropping relay from {} without target", from);
            return;
        };

        if self.registry.lookup(to).is_none() {
            debug!("Dropping relay from {} to unknown client {}", from, to);
            return;
        }

        self.deliver(to, OutboundMessage::from(text));
    }

    fn send(&self, id: ClientId, msg: &ServerMessage) {
        match msg.encode() {
            Ok(out) => self.deliver(id, out),
            Err(e) => error!("Failed to encode {:?}: {}", msg, e),
        }
    }

    fn broadcast(&self, recipients: &[ClientId], msg: &ServerMessage) {
        if recipients.is_empty() {
            return;
        }

        let out = match msg.encode() {
            Ok(out) => out,
            Err(e) => {
                error!("Failed to encode {:?}: {}", msg, e);
                return;
            }
        };

        for &recipient in recipients {
            self.deliver(recipient, out.clone());
        }
    }

    fn deliver(&self, id: ClientId, out: OutboundMessage) {
        let Some(entry) = self.registry.lookup(id) else {
            return;
        };
        if let Err(e) = entry.deliver(id, out) {
            debug!("Delivery failed: {}", e);
        }
    }
}
