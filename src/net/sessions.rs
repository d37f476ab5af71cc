use std::{collections::HashMap, sync::atomic::{AtomicU64, Ordering}};

use cgmath::Vector2;
use parking_lot::Mutex;

use crate::tilecraft::player::{PlayerState, SessionId};

/// Server-side table of connected players. Every read and write goes
/// through one lock, so a snapshot never sees a half-applied update.
pub struct SessionRegistry {
    players: Mutex<HashMap<SessionId, PlayerState>>,
    next_id: AtomicU64
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry { players: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Ids start at 1 and are never handed out twice.
    pub fn register(&self) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.players.lock().insert(id, PlayerState::new(id));
        id
    }

    /// Returns false for sessions that are gone.
    pub fn update(&self, id: SessionId, position: Vector2<f32>, velocity: Vector2<f32>, on_ground: bool) -> bool {
        match self.players.lock().get_mut(&id) {
            Some(player) => {
                player.position = position;
                player.velocity = velocity;
                player.on_ground = on_ground;
                true
            },
            None => false
        }
    }

    pub fn remove(&self, id: SessionId) -> Option<PlayerState> {
        self.players.lock().remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<PlayerState> {
        self.players.lock().get(&id).copied()
    }

    pub fn snapshot(&self) -> HashMap<SessionId, PlayerState> {
        self.players.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        SessionRegistry::new()
    }
}
