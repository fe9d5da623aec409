//! Room Directory
//!
//! Maps room identifiers to the conversation that owns the room. Iteration
//! order is the room id order, which keeps departure scans deterministic.

use std::collections::BTreeMap;

use crate::types::{ConversationHandle, RoomId};

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<RoomId, ConversationHandle>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room: &RoomId) -> Option<ConversationHandle> {
        self.rooms.get(room).copied()
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Record a new room. An existing entry is never replaced; returns false in that case.
    pub fn insert(&mut self, room: RoomId, conversation: ConversationHandle) -> bool {
        if self.rooms.contains_key(&room) {
            return false;
        }
        self.rooms.insert(room, conversation);
        true
    }

    pub fn remove(&mut self, room: &RoomId) -> Option<ConversationHandle> {
        self.rooms.remove(room)
    }

    /// Room owned by `conversation`, if any
    pub fn room_of(&self, conversation: ConversationHandle) -> Option<&RoomId> {
        self.rooms
            .iter()
            .find(|(_, handle)| **handle == conversation)
            .map(|(room, _)| room)
    }

    /// First room, in room id order, whose conversation satisfies `holds`
    pub fn find_first<F>(&self, mut holds: F) -> Option<(&RoomId, ConversationHandle)>
    where
        F: FnMut(ConversationHandle) -> bool,
    {
        self.rooms
            .iter()
            .find(|(_, conversation)| holds(**conversation))
            .map(|(room, conversation)| (room, *conversation))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, ConversationHandle)> {
        self.rooms.iter().map(|(room, conversation)| (room, *conversation))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
