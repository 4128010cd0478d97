//! Message dispatcher: routes room messages and the leave notice.
//!
//! Built-in reactions run first, in a fixed order, then every attached
//! [`MessageObserver`]. An observer that fails is logged and reported; the
//! remaining observers still run.

use log::{debug, info, warn};

use crate::error::{FatalCondition, SyncError};
use crate::protocol::{acts, close_codes, RoomMessage};
use crate::room::RoomHandle;
use crate::room_events::RoomEvents;

/// Extra message reaction attached by a feature.
pub trait MessageObserver: Send {
    /// Short label used in logs and error reports.
    fn name(&self) -> &str;

    fn on_message(&mut self, room: &dyn RoomHandle, message: &RoomMessage) -> Result<(), SyncError>;
}

impl RoomEvents {
    /// Attach a message reaction. Valid before and after activation.
    pub fn attach_observer(&mut self, observer: Box<dyn MessageObserver>) {
        debug!("[{}] observer '{}' attached", self.room_name, observer.name());
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn dispatch_message(&mut self, message: &RoomMessage) {
        let Some(room) = self.room.clone() else {
            return;
        };

        match message.act.as_str() {
            acts::CHANGED_SCENE => self.apply_scene_change_notice(room.as_ref(), message),
            acts::RECONNECT => {
                info!("[{}] reconnect directive", self.room_name);
                self.shell.reconnect(message, room.clone());
            }
            acts::PLAYER_STATS => self.activate_player_stats(message),
            _ => {}
        }

        for observer in self.observers.iter_mut() {
            if let Err(e) = observer.on_message(room.as_ref(), message) {
                warn!(
                    "[{}] observer '{}' failed on '{}': {}",
                    self.room_name,
                    observer.name(),
                    message.act,
                    e
                );
                self.shell.report(&SyncError::Observer {
                    observer: observer.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Another room announced a participant moving into this one.
    fn apply_scene_change_notice(&mut self, room: &dyn RoomHandle, message: &RoomMessage) {
        if message.scene.as_deref() != Some(room.name()) {
            return;
        }
        let Some(id) = message.id.as_deref() else {
            return;
        };
        if id == room.session_id() {
            return;
        }
        let Some(snapshot) = message.snapshot() else {
            debug!("[{}] scene change notice for {} without position", self.room_name, id);
            return;
        };

        let descriptor = self.descriptor();
        let mut session = self.session.lock();
        let Some(container) = session
            .ensure_context(&self.room_name, descriptor.as_ref())
            .and_then(|ctx| ctx.players_mut())
        else {
            return;
        };
        if container.add_player(id, snapshot) {
            debug!("[{}] {} arrived from another room", self.room_name, id);
        } else {
            debug!("[{}] {} already present, notice ignored", self.room_name, id);
        }
    }

    pub(crate) fn handle_leave(&mut self, code: u16) {
        if code > close_codes::NORMAL {
            warn!("[{}] left with code {}", self.room_name, code);
            self.shell.fatal(FatalCondition::ConnectionError { code });
        } else {
            debug!("[{}] left normally ({})", self.room_name, code);
        }
    }
}
