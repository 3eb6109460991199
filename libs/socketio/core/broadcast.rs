//! Room membership
//!
//! The broadcast sink shared by a namespace handler and every namespace
//! connection bound to it. Each namespace connection joins a room named
//! after its own connection id so it can be targeted individually.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Room -> member connection ids
#[derive(Debug, Default)]
pub struct Broadcast {
    rooms: RwLock<HashMap<String, HashSet<String>>>,
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room; joining twice is a no-op
    pub fn join(&self, room: &str, conn_id: &str) {
        self.rooms
            .write()
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Remove a connection from a room; empty rooms are dropped
    pub fn leave(&self, room: &str, conn_id: &str) {
        let mut rooms = self.rooms.write();
        if let Some(members) = rooms.get_mut(room) {
            members.remove(conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Remove a connection from every room
    pub fn leave_all(&self, conn_id: &str) {
        let mut rooms = self.rooms.write();
        rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }

    /// Rooms a connection belongs to, sorted
    pub fn rooms(&self, conn_id: &str) -> Vec<String> {
        let mut joined: Vec<String> = self
            .rooms
            .read()
            .iter()
            .filter(|(_, members)| members.contains(conn_id))
            .map(|(room, _)| room.clone())
            .collect();
        joined.sort();
        joined
    }

    /// Members of a room
    pub fn members(&self, room: &str) -> Vec<String> {
        self.rooms
            .read()
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of members in a room
    pub fn len(&self, room: &str) -> usize {
        self.rooms.read().get(room).map_or(0, HashSet::len)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_leave() {
        let broadcast = Broadcast::new();
        broadcast.join("lobby", "a");
        broadcast.join("lobby", "b");
        broadcast.join("lobby", "a");
        assert_eq!(broadcast.len("lobby"), 2);

        broadcast.leave("lobby", "a");
        assert_eq!(broadcast.members("lobby"), vec!["b".to_string()]);

        broadcast.leave("lobby", "b");
        assert_eq!(broadcast.room_count(), 0);
    }

    #[test]
    fn test_leave_all() {
        let broadcast = Broadcast::new();
        broadcast.join("a", "conn");
        broadcast.join("b", "conn");
        broadcast.join("b", "other");

        assert_eq!(broadcast.rooms("conn"), vec!["a".to_string(), "b".to_string()]);

        broadcast.leave_all("conn");
        assert!(broadcast.rooms("conn").is_empty());
        assert_eq!(broadcast.len("b"), 1);
        assert_eq!(broadcast.room_count(), 1);
    }
}
