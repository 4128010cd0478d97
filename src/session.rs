//! `GameSession`: the process-wide context injected into every room session.
//!
//! Holds the scene registry, the shared UI surface and the "currently active
//! room" pointer, plus the collaborators the core calls out to (asset loader,
//! session shell, features). Several sessions can live side by side in tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FatalCondition, SyncError};
use crate::protocol::{PreloadAsset, RoomDescriptor, RoomMessage};
use crate::room::RoomHandle;
use crate::room_events::RoomEvents;
use crate::scene::{PresentationContext, SceneRegistry};
use crate::types::ClientConfig;
use crate::ui::UiSurface;

pub type SharedSession = Arc<Mutex<GameSession>>;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Everything the loader needs to fetch for one loading stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadRequest {
    /// Loading-stage context key; echoed back on completion.
    pub key: String,
    pub room_name: String,
    pub map: String,
    pub images: Vec<String>,
    pub assets: Vec<PreloadAsset>,
}

/// Starts asset preloads. Completion is reported back by whoever owns the
/// event loop through [`RoomEvents::on_preload_complete`].
pub trait AssetLoader: Send + Sync {
    fn begin(&self, request: PreloadRequest);
}

/// The outer shell: owns reloads, re-authentication and reconnection.
pub trait SessionShell: Send + Sync {
    /// Terminal condition; the shell must notify the user and re-enter the
    /// join flow.
    fn fatal(&self, condition: FatalCondition);
    /// Internal error worth surfacing (protocol inconsistency, bad payload).
    fn report(&self, error: &SyncError);
    /// Server asked this client to reconnect.
    fn reconnect(&self, message: &RoomMessage, room: Arc<dyn RoomHandle>);
}

/// A game feature that wants to react to room messages.
pub trait Feature: Send + Sync {
    fn attach_observers(&self, room: &mut RoomEvents);
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

pub struct GameSession {
    config: ClientConfig,
    pub(crate) scenes: Box<dyn SceneRegistry>,
    pub(crate) ui: Option<UiSurface>,
    pub(crate) active_room: Option<String>,
    pub(crate) loader: Arc<dyn AssetLoader>,
    shell: Arc<dyn SessionShell>,
    features: Vec<Arc<dyn Feature>>,
}

impl GameSession {
    pub fn new(
        config: ClientConfig,
        scenes: Box<dyn SceneRegistry>,
        loader: Arc<dyn AssetLoader>,
        shell: Arc<dyn SessionShell>,
    ) -> Self {
        Self {
            config,
            scenes,
            ui: None,
            active_room: None,
            loader,
            shell,
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: Arc<dyn Feature>) -> Self {
        self.features.push(feature);
        self
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn scenes(&self) -> &dyn SceneRegistry {
        self.scenes.as_ref()
    }

    pub fn ui(&self) -> Option<&UiSurface> {
        self.ui.as_ref()
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active_room.as_deref()
    }

    pub fn shell(&self) -> Arc<dyn SessionShell> {
        self.shell.clone()
    }

    pub(crate) fn features(&self) -> Vec<Arc<dyn Feature>> {
        self.features.clone()
    }

    // -----------------------------------------------------------------------
    // Active-context resolution
    // -----------------------------------------------------------------------

    /// Pure lookup; never creates anything.
    pub fn try_get_context(&self, key: &str) -> Option<&PresentationContext> {
        self.scenes.get(key)
    }

    pub fn try_get_context_mut(&mut self, key: &str) -> Option<&mut PresentationContext> {
        self.scenes.get_mut(key)
    }

    /// Lookup that registers an unstarted, non-playable placeholder when
    /// `key` is missing and a descriptor is available.
    pub fn ensure_context(
        &mut self,
        key: &str,
        descriptor: Option<&Arc<RoomDescriptor>>,
    ) -> Option<&mut PresentationContext> {
        if !self.scenes.contains(key) {
            let descriptor = descriptor?;
            self.scenes
                .add(PresentationContext::placeholder(key, descriptor.clone()), false);
        }
        self.scenes.get_mut(key)
    }
}

// ---------------------------------------------------------------------------
// Recording collaborators (replay tool + tests)
// ---------------------------------------------------------------------------

/// Shell that records every call instead of reloading anything.
#[derive(Default)]
pub struct RecordingShell {
    fatal: Mutex<Vec<FatalCondition>>,
    reports: Mutex<Vec<String>>,
    reconnects: Mutex<Vec<(String, RoomMessage)>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal_conditions(&self) -> Vec<FatalCondition> {
        self.fatal.lock().clone()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    /// `(room name, directive)` pairs.
    pub fn reconnects(&self) -> Vec<(String, RoomMessage)> {
        self.reconnects.lock().clone()
    }
}

impl SessionShell for RecordingShell {
    fn fatal(&self, condition: FatalCondition) {
        log::error!("fatal: {}", condition);
        self.fatal.lock().push(condition);
    }

    fn report(&self, error: &SyncError) {
        log::error!("sync error: {}", error);
        self.reports.lock().push(error.to_string());
    }

    fn reconnect(&self, message: &RoomMessage, room: Arc<dyn RoomHandle>) {
        log::info!("reconnect requested by room '{}'", room.name());
        self.reconnects
            .lock()
            .push((room.name().to_string(), message.clone()));
    }
}

/// Loader that only records requests; completion is driven by hand.
#[derive(Default)]
pub struct RecordingLoader {
    requests: Mutex<Vec<PreloadRequest>>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PreloadRequest> {
        self.requests.lock().clone()
    }
}

impl AssetLoader for RecordingLoader {
    fn begin(&self, request: PreloadRequest) {
        self.requests.lock().push(request);
    }
}
