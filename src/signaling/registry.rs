use std::collections::HashMap;

use rand::Rng;
use tokio::sync::mpsc;

use super::types::{ClientId, OutboundMessage, RoomName, SignalingError};

#[derive(Debug)]
pub(crate) struct ClientEntry {
    /// Channel for outbound messages to this client.
    /// Uses OutboundMessage (Utf8Bytes) for O(1) broadcast cloning.
    tx: mpsc::UnboundedSender<OutboundMessage>,
    room: Option<RoomName>,
}

impl ClientEntry {
    pub fn room(&self) -> Option<&RoomName> {
        self.room.as_ref()
    }

    /// Push a message to the client's connection. A closed connection is
    /// reported as unreachable, never as a panic.
    pub fn deliver(&self, id: ClientId, msg: OutboundMessage) -> Result<(), SignalingError> {
        self.tx
            .send(msg)
            .map_err(|_| SignalingError::Unreachable(id))
    }
}

/// Live clients keyed by server-issued id
#[derive(Debug)]
pub(crate) struct ClientRegistry {
    clients: HashMap<ClientId, ClientEntry>,
    salt: u32,
    next_seq: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::with_salt(rand::rng().random())
    }

    pub fn with_salt(salt: u32) -> Self {
        Self {
            clients: HashMap::new(),
            salt,
            next_seq: 0,
        }
    }

    /// Allocate a fresh id and create an entry with no room.
    pub fn register(&mut self, tx: mpsc::UnboundedSender<OutboundMessage>) -> ClientId {
        let id = ClientId::from_parts(self.salt, self.next_seq);
        self.next_seq += 1;
        self.clients.insert(id, ClientEntry { tx, room: None });
        id
    }

    pub fn lookup(&self, id: ClientId) -> Option<&ClientEntry> {
        self.clients.get(&id)
    }

    pub fn set_room(&mut self, id: ClientId, room: Option<RoomName>) {
        if let Some(entry) = self.clients.get_mut(&id) {
            entry.room = room;
        }
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientEntry> {
        self.clients.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}
