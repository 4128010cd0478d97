//! `RoomEvents`: the reactions of one joined room.
//!
//! Ties the room's entity lifecycle events to the presentation: buffers
//! early remote snapshots, runs the bootstrap when the local entity shows up,
//! and keeps the active container in step with the roster afterwards.
//! Message routing lives in [`crate::dispatch`].

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::bootstrap::{self, BootstrapOutcome};
use crate::dispatch::MessageObserver;
use crate::error::{FatalCondition, SyncError};
use crate::pending::{PendingBootstrap, PendingSnapshotQueue, SyncState};
use crate::protocol::{RoomDescriptor, RoomMessage};
use crate::room::{RoomEventSink, RoomHandle};
use crate::session::{SessionShell, SharedSession};
use crate::types::RemoteEntityState;
use crate::ui::{elements, render_stats};

/// Parsed descriptor plus the fingerprint of the payload it came from.
struct CachedDescriptor {
    fingerprint: [u8; 16],
    descriptor: Arc<RoomDescriptor>,
}

pub struct RoomEvents {
    pub(crate) room_name: String,
    pub(crate) session: SharedSession,
    pub(crate) shell: Arc<dyn SessionShell>,
    pub(crate) room: Option<Arc<dyn RoomHandle>>,
    previous_scene: Option<String>,
    descriptor: Option<CachedDescriptor>,
    state: SyncState,
    pub(crate) observers: Vec<Box<dyn MessageObserver>>,
    session_lost: bool,
    descriptor_parses: usize,
}

impl RoomEvents {
    pub fn new(room_name: impl Into<String>, session: SharedSession) -> Self {
        let shell = session.lock().shell();
        Self {
            room_name: room_name.into(),
            session,
            shell,
            room: None,
            previous_scene: None,
            descriptor: None,
            state: SyncState::default(),
            observers: Vec::new(),
            session_lost: false,
            descriptor_parses: 0,
        }
    }

    /// Wire this room session onto a freshly joined room.
    ///
    /// `previous_scene` is set when the join is a room switch. Every feature
    /// registered on the session gets to attach its observers first.
    pub fn activate(
        mut self,
        room: Arc<dyn RoomHandle>,
        previous_scene: Option<String>,
    ) -> Arc<Mutex<RoomEvents>> {
        info!(
            "[{}] activating (session {}, previous scene {:?})",
            self.room_name,
            room.session_id(),
            previous_scene
        );
        self.room = Some(room.clone());
        self.previous_scene = previous_scene;

        let features = self.session.lock().features();
        for feature in features {
            feature.attach_observers(&mut self);
        }

        let events = Arc::new(Mutex::new(self));
        room.subscribe(events.clone());
        events
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingSnapshotQueue> {
        self.state.queue()
    }

    pub fn descriptor(&self) -> Option<Arc<RoomDescriptor>> {
        self.descriptor.as_ref().map(|c| c.descriptor.clone())
    }

    /// How many times the descriptor payload was actually parsed.
    pub fn descriptor_parses(&self) -> usize {
        self.descriptor_parses
    }

    // -----------------------------------------------------------------------
    // Preload re-entry
    // -----------------------------------------------------------------------

    /// Loader reports `preloader` finished. Returns `true` if this room
    /// session was waiting on it.
    pub fn on_preload_complete(&mut self, preloader: &str) -> bool {
        match &self.state {
            SyncState::Bootstrapping { pending, .. } if pending.preloader == preloader => {}
            _ => return false,
        }
        let (Some(room), Some(descriptor)) = (self.room.clone(), self.descriptor()) else {
            return false;
        };
        let SyncState::Bootstrapping { queue, pending } = std::mem::take(&mut self.state) else {
            return false;
        };

        let result = {
            let mut session = self.session.lock();
            bootstrap::complete_preload(
                &mut session,
                room.as_ref(),
                &pending.player,
                self.previous_scene.as_deref(),
                &descriptor,
                preloader,
            )
        };

        match result {
            Ok(()) => self.finish_bootstrap(queue, &pending.player),
            Err(e) => {
                self.state = SyncState::Loading { queue };
                self.shell.report(&e);
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Descriptor cache
    // -----------------------------------------------------------------------

    fn refresh_descriptor(&mut self, room: &dyn RoomHandle) -> Result<(), SyncError> {
        let payload = room.scene_data();
        let fingerprint = md5::compute(payload.as_bytes()).0;
        if matches!(&self.descriptor, Some(c) if c.fingerprint == fingerprint) {
            return Ok(());
        }
        let descriptor = RoomDescriptor::parse(&payload).map_err(|source| SyncError::Descriptor {
            room: self.room_name.clone(),
            source,
        })?;
        self.descriptor_parses += 1;
        debug!(
            "[{}] descriptor parsed: '{}' ({})",
            self.room_name, descriptor.room_title, descriptor.room_map
        );
        self.descriptor = Some(CachedDescriptor {
            fingerprint,
            descriptor: Arc::new(descriptor),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Local entity → bootstrap
    // -----------------------------------------------------------------------

    fn bootstrap_local(&mut self, room: Arc<dyn RoomHandle>, player: &RemoteEntityState) {
        if !matches!(self.state, SyncState::Loading { .. }) {
            debug!(
                "[{}] local entity re-added while {}, ignored",
                self.room_name,
                self.state.name()
            );
            return;
        }
        let Some(descriptor) = self.descriptor() else {
            return;
        };
        let SyncState::Loading { queue } = std::mem::take(&mut self.state) else {
            return;
        };

        let outcome = {
            let mut session = self.session.lock();
            bootstrap::start_engine_scene(
                &mut session,
                room.as_ref(),
                player,
                self.previous_scene.as_deref(),
                &descriptor,
            )
        };

        match outcome {
            Ok(BootstrapOutcome::Preloading { preloader }) => {
                self.state = SyncState::Bootstrapping {
                    queue,
                    pending: PendingBootstrap {
                        player: player.clone(),
                        preloader,
                    },
                };
            }
            Ok(BootstrapOutcome::Completed) => self.finish_bootstrap(queue, player),
            Err(e) => {
                self.state = SyncState::Loading { queue };
                self.shell.report(&e);
            }
        }
    }

    /// Drain buffered snapshots into the new container and go `Ready`.
    fn finish_bootstrap(&mut self, mut queue: PendingSnapshotQueue, player: &RemoteEntityState) {
        {
            let mut session = self.session.lock();
            match session
                .try_get_context_mut(&self.room_name)
                .filter(|ctx| ctx.key() == player.state.scene)
                .and_then(|ctx| ctx.players_mut())
            {
                Some(container) => {
                    let drained = queue.drain();
                    let count = drained.len();
                    for (key, snapshot) in drained {
                        container.place(&key, snapshot);
                    }
                    if count > 0 {
                        debug!("[{}] drained {} buffered players", self.room_name, count);
                    }
                }
                None if !queue.is_empty() => {
                    warn!(
                        "[{}] no container for scene '{}', dropping {} buffered players",
                        self.room_name,
                        player.state.scene,
                        queue.len()
                    );
                }
                None => {}
            }
        }
        self.state = SyncState::Ready;
    }

    // -----------------------------------------------------------------------
    // Remote entities
    // -----------------------------------------------------------------------

    fn add_remote(&mut self, entity: &RemoteEntityState, key: &str) {
        if let Some(queue) = self.state.queue_mut() {
            if entity.state.scene == self.room_name {
                queue.push(key, entity.state.snapshot());
            }
            return;
        }

        let mut session = self.session.lock();
        let Some(ctx) = session.try_get_context_mut(&self.room_name) else {
            return;
        };
        if ctx.key() != entity.state.scene {
            return;
        }
        if let Some(container) = ctx.players_mut() {
            if !container.add_player(key, entity.state.snapshot()) {
                debug!("[{}] {} already present", self.room_name, key);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Apply a stats push to the local sprite and the stats panel. Either
    /// target may be missing.
    pub(crate) fn activate_player_stats(&mut self, message: &RoomMessage) {
        let Some(stats) = message.stats.clone() else {
            debug!("[{}] stats push without payload, ignored", self.room_name);
            return;
        };
        let mut session = self.session.lock();

        if let Some(container) = session
            .try_get_context_mut(&self.room_name)
            .and_then(|ctx| ctx.players_mut())
        {
            container.owner_mut().stats = stats.clone();
        }

        if let Some(panel) = session.ui.as_mut().and_then(|ui| ui.player_stats.as_mut()) {
            panel.set_text(elements::PLAYER_STATS, render_stats(&stats));
        }
    }
}

// ---------------------------------------------------------------------------
// Room event sink
// ---------------------------------------------------------------------------

impl RoomEventSink for RoomEvents {
    fn on_entity_added(&mut self, entity: &RemoteEntityState, key: &str) {
        let Some(room) = self.room.clone() else {
            return;
        };
        let is_local = key == room.session_id();

        if let Err(e) = self.refresh_descriptor(room.as_ref()) {
            self.shell.report(&e);
            if is_local {
                return;
            }
        }

        if is_local {
            self.bootstrap_local(room, entity);
        } else {
            self.add_remote(entity, key);
        }
    }

    fn on_entity_changed(&mut self, entity: &RemoteEntityState, key: &str) {
        // mid-transition; the cross-room notice handles it
        if entity.state.scene != self.room_name {
            return;
        }
        let mut session = self.session.lock();
        if let Some(container) = session
            .try_get_context_mut(&self.room_name)
            .and_then(|ctx| ctx.players_mut())
        {
            container.run_player_animation(key, &entity.state);
        }
    }

    fn on_entity_removed(&mut self, _entity: &RemoteEntityState, key: &str) {
        let is_local = self
            .room
            .as_ref()
            .is_some_and(|room| room.session_id() == key);

        if is_local {
            if !self.session_lost {
                self.session_lost = true;
                self.shell.fatal(FatalCondition::SessionEnded);
            }
            return;
        }

        if let Some(queue) = self.state.queue_mut() {
            queue.remove(key);
        }
        let mut session = self.session.lock();
        if let Some(container) = session
            .try_get_context_mut(&self.room_name)
            .and_then(|ctx| ctx.players_mut())
        {
            container.remove_player(key);
        }
    }

    fn on_message(&mut self, message: &RoomMessage) {
        self.dispatch_message(message);
    }

    fn on_leave(&mut self, code: u16) {
        self.handle_leave(code);
    }
}
