//! Game registry: the process-wide map of live game sessions.
//!
//! Sessions are handed out as `Arc`s, so removal only drops the registry's
//! reference. An AI task still driving the session keeps its own handle
//! and can finish (or notice cancellation) without touching freed state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::session::GameSession;

/// Thread-safe id → session map.
#[derive(Default)]
pub struct GameRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<GameSession>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session under its own id.
    pub fn insert(&self, session: Arc<GameSession>) {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id, session.clone());
    }

    /// Looks up a session by id.
    pub fn get(&self, id: &Uuid) -> Option<Arc<GameSession>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Removes a session, returning it if it was present. Removing an
    /// already-removed id is a no-op.
    pub fn remove(&self, id: &Uuid) -> Option<Arc<GameSession>> {
        self.sessions.write().unwrap().remove(id)
    }

    /// All sessions, in no particular order.
    pub fn list(&self) -> Vec<Arc<GameSession>> {
        self.sessions.read().unwrap().values().cloned().collect()
    }
}
