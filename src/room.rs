//! Room abstraction consumed by the core.
//!
//! The transport owns the room; the core only sees [`RoomHandle`] and is
//! driven through [`RoomEventSink`]. [`MemoryRoom`] is an in-process room used
//! by the replay tool and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::SyncError;
use crate::protocol::{OutboundMessage, RoomMessage};
use crate::types::RemoteEntityState;

/// Shared, lockable event sink as held by a room.
pub type SharedSink = Arc<Mutex<dyn RoomEventSink>>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Reactions a room delivers to. Implemented by
/// [`crate::room_events::RoomEvents`].
pub trait RoomEventSink: Send {
    fn on_entity_added(&mut self, entity: &RemoteEntityState, key: &str);
    fn on_entity_changed(&mut self, entity: &RemoteEntityState, key: &str);
    fn on_entity_removed(&mut self, entity: &RemoteEntityState, key: &str);
    fn on_message(&mut self, message: &RoomMessage);
    fn on_leave(&mut self, code: u16);
}

/// One joined room, as seen from the client.
pub trait RoomHandle: Send + Sync {
    /// Room identifier; also the key of the room's playable context.
    fn name(&self) -> &str;
    /// Session identifier of the local client in this room.
    fn session_id(&self) -> &str;
    /// Serialized [`crate::protocol::RoomDescriptor`].
    fn scene_data(&self) -> String;
    /// Current authoritative roster. Order is unspecified.
    fn players(&self) -> Vec<RemoteEntityState>;
    /// One-way send. Failures are the caller's to log.
    fn send(&self, message: OutboundMessage) -> Result<(), SyncError>;
    /// Register a sink for entity lifecycle, message and leave events.
    fn subscribe(&self, sink: SharedSink);
}

// ---------------------------------------------------------------------------
// MemoryRoom
// ---------------------------------------------------------------------------

/// In-process room: mutating calls update the roster first, then notify every
/// subscribed sink in subscription order.
pub struct MemoryRoom {
    name: String,
    session_id: String,
    scene_data: Mutex<String>,
    roster: Mutex<HashMap<String, RemoteEntityState>>,
    sent: Mutex<Vec<OutboundMessage>>,
    sinks: Mutex<Vec<SharedSink>>,
    closed: Mutex<Option<u16>>,
}

impl MemoryRoom {
    pub fn new(
        name: impl Into<String>,
        session_id: impl Into<String>,
        scene_data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
            scene_data: Mutex::new(scene_data.into()),
            roster: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
        }
    }

    /// Put an entity on the roster without notifying anyone (state that
    /// existed before the client subscribed).
    pub fn seed_player(&self, entity: RemoteEntityState) {
        self.roster.lock().insert(entity.session_id.clone(), entity);
    }

    pub fn set_scene_data(&self, scene_data: impl Into<String>) {
        *self.scene_data.lock() = scene_data.into();
    }

    pub fn add_player(&self, entity: RemoteEntityState) {
        self.roster
            .lock()
            .insert(entity.session_id.clone(), entity.clone());
        let key = entity.session_id.clone();
        self.each_sink(|sink| sink.on_entity_added(&entity, &key));
    }

    pub fn change_player(&self, entity: RemoteEntityState) {
        self.roster
            .lock()
            .insert(entity.session_id.clone(), entity.clone());
        let key = entity.session_id.clone();
        self.each_sink(|sink| sink.on_entity_changed(&entity, &key));
    }

    pub fn remove_player(&self, key: &str) -> bool {
        let Some(entity) = self.roster.lock().remove(key) else {
            debug!("[room {}] remove for unknown player {}", self.name, key);
            return false;
        };
        self.each_sink(|sink| sink.on_entity_removed(&entity, key));
        true
    }

    pub fn push_message(&self, message: RoomMessage) {
        self.each_sink(|sink| sink.on_message(&message));
    }

    pub fn leave(&self, code: u16) {
        *self.closed.lock() = Some(code);
        self.each_sink(|sink| sink.on_leave(code));
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    pub fn closed_with(&self) -> Option<u16> {
        *self.closed.lock()
    }

    /// Snapshot the sink list so no room lock is held while a sink runs;
    /// sinks call back into `players()` and `send()`.
    fn each_sink(&self, mut f: impl FnMut(&mut dyn RoomEventSink)) {
        let sinks: Vec<SharedSink> = self.sinks.lock().clone();
        for sink in sinks {
            let mut guard = sink.lock();
            f(&mut *guard);
        }
    }
}

impl RoomHandle for MemoryRoom {
    fn name(&self) -> &str {
        &self.name
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn scene_data(&self) -> String {
        self.scene_data.lock().clone()
    }

    fn players(&self) -> Vec<RemoteEntityState> {
        self.roster.lock().values().cloned().collect()
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SyncError> {
        if let Some(code) = *self.closed.lock() {
            return Err(SyncError::Send {
                room: self.name.clone(),
                act: message.act,
                reason: format!("room closed with code {}", code),
            });
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn subscribe(&self, sink: SharedSink) {
        self.sinks.lock().push(sink);
    }
}
