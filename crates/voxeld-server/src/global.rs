use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use voxeld_types::ConnectionId;
use voxeld_world::{ChunkStore, PlayerTracker};

use crate::config::ServerConfig;
use crate::session::Session;

/// Process-wide state: settings, the monotonic clock, id generators, the
/// world, the tracker, and the table of live sessions. Owns every `Session`
/// strongly; the tracker and any other holder keeps only a `ConnectionId`.
pub struct GlobalState {
    pub config: ServerConfig,
    start: Instant,
    next_entity_id: AtomicI32,
    next_connection_id: AtomicU32,
    pub chunk_store: ChunkStore,
    pub tracker: PlayerTracker,
    sessions: RwLock<HashMap<ConnectionId, Arc<Session>>>,
}

impl GlobalState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            start: Instant::now(),
            next_entity_id: AtomicI32::new(1),
            next_connection_id: AtomicU32::new(0),
            chunk_store: ChunkStore::new(),
            tracker: PlayerTracker::new(),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Nanoseconds since server start, monotonic; wraps nothing short of
    /// centuries of uptime.
    pub fn now_ns(&self) -> i64 {
        self.start.elapsed().as_nanos() as i64
    }

    pub fn next_entity_id(&self) -> i32 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register_session(&self, session: Arc<Session>) {
        self.sessions.write().expect("sessions lock poisoned").insert(session.id, session);
    }

    pub fn remove_session(&self, id: ConnectionId) {
        self.sessions.write().expect("sessions lock poisoned").remove(&id);
    }

    pub fn session(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.read().expect("sessions lock poisoned").get(&id).cloned()
    }

    /// A snapshot of every live session, safe to iterate without holding the
    /// sessions lock (matches the "playersMutex" broadcast discipline).
    pub fn sessions_snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().expect("sessions lock poisoned").values().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.sessions.read().expect("sessions lock poisoned").len()
    }
}
