use std::collections::{HashMap, HashSet};

use tracing::info;

use super::types::{ClientId, RoomName};

/// Room name to member ids. Holds ids only; connection handles stay in the
/// registry.
#[derive(Debug, Default)]
pub(crate) struct RoomDirectory {
    rooms: HashMap<RoomName, HashSet<ClientId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing member set for `room`, created empty if absent.
    pub fn ensure(&mut self, room: &RoomName) -> &mut HashSet<ClientId> {
        self.rooms.entry(room.clone()).or_insert_with(|| {
            info!("Room created: {}", room);
            HashSet::new()
        })
    }

    pub fn lookup(&self, room: &RoomName) -> Option<&HashSet<ClientId>> {
        self.rooms.get(room)
    }

    pub fn add_member(&mut self, room: &RoomName, id: ClientId) -> bool {
        self.ensure(room).insert(id)
    }

    /// Remove `id` from `room`; the room itself is dropped once empty.
    pub fn remove_member(&mut self, room: &RoomName, id: ClientId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };

        let removed = members.remove(&id);
        if members.is_empty() {
            self.rooms.remove(room);
            info!("Room {} removed (empty)", room);
        }
        removed
    }

    /// Snapshot of the member set, for broadcast iteration.
    pub fn members(&self, room: &RoomName) -> Vec<ClientId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ClientId {
        ClientId::parse(s).unwrap()
    }

    #[test]
    fn ensure_creates_empty_room_once() {
        let mut directory = RoomDirectory::new();
        let room = RoomName::new("abc");

        directory.ensure(&room).insert(id("a"));
        assert_eq!(directory.ensure(&room).len(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive_through_room_name() {
        let mut directory = RoomDirectory::new();
        directory.add_member(&RoomName::new("abc"), id("a"));

        assert!(directory.lookup(&RoomName::new("ABC")).is_some());
        assert!(directory.lookup(&RoomName::new("abd")).is_none());
    }

    #[test]
    fn add_member_has_set_semantics() {
        let mut directory = RoomDirectory::new();
        let room = RoomName::new("r");

        assert!(directory.add_member(&room, id("a")));
        assert!(!directory.add_member(&room, id("a")));
        assert_eq!(directory.members(&room), vec![id("a")]);
    }

    #[test]
    fn remove_member_absent_is_noop() {
        let mut directory = RoomDirectory::new();
        let room = RoomName::new("r");

        assert!(!directory.remove_member(&room, id("a")));
        directory.add_member(&room, id("a"));
        assert!(!directory.remove_member(&room, id("b")));
        assert_eq!(directory.members(&room).len(), 1);
    }

    #[test]
    fn last_member_leaving_removes_room() {
        let mut directory = RoomDirectory::new();
        let room = RoomName::new("r");
        directory.add_member(&room, id("a"));
        directory.add_member(&room, id("b"));

        assert!(directory.remove_member(&room, id("a")));
        assert!(directory.lookup(&room).is_some());

        assert!(directory.remove_member(&room, id("b")));
        assert!(directory.lookup(&room).is_none());
        assert_eq!(directory.len(), 0);
    }

    #[test]
    fn members_snapshot_is_detached() {
        let mut directory = RoomDirectory::new();
        let room = RoomName::new("r");
        directory.add_member(&room, id("a"));

        let snapshot = directory.members(&room);
        directory.add_member(&room, id("b"));

        assert_eq!(snapshot, vec![id("a")]);
        assert!(directory.members(&RoomName::new("missing")).is_empty());
    }
}
