//! Presentation contexts, the registry that holds them, and the per-context
//! player container.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::protocol::RoomDescriptor;
use crate::types::{PlayerSnapshot, PlayerState, RemoteEntityState, UiConfig};
use crate::ui::UiSurface;

// ---------------------------------------------------------------------------
// Player sprites + container
// ---------------------------------------------------------------------------

/// Local handle for one materialized participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSprite {
    pub session_id: String,
    pub x: f32,
    pub y: f32,
    pub dir: String,
    pub stats: serde_json::Value,
    /// Movement/animation updates applied since creation.
    pub moves: u32,
}

impl PlayerSprite {
    fn new(session_id: &str, snapshot: PlayerSnapshot) -> Self {
        Self {
            session_id: session_id.to_string(),
            x: snapshot.x,
            y: snapshot.y,
            dir: snapshot.dir,
            stats: serde_json::Value::Null,
            moves: 0,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot::new(self.x, self.y, self.dir.clone())
    }
}

/// The entities visible in one playable context.
///
/// The local player is the container's owner and is never a member of
/// `players`; only remote participants are.
#[derive(Debug, Clone)]
pub struct PlayerContainer {
    room_name: String,
    owner: PlayerSprite,
    owner_name: String,
    players: HashMap<String, PlayerSprite>,
    created: bool,
}

impl PlayerContainer {
    pub fn new(owner: &RemoteEntityState, room_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
            owner: PlayerSprite::new(&owner.session_id, owner.state.snapshot()),
            owner_name: owner.username.clone(),
            players: HashMap::new(),
            created: false,
        }
    }

    /// Creation hook: runs once when the container is installed in a context.
    pub fn create(&mut self) {
        if self.created {
            return;
        }
        self.created = true;
        debug!(
            "[{}] player container created for {} ({})",
            self.room_name, self.owner.session_id, self.owner_name
        );
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn owner(&self) -> &PlayerSprite {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut PlayerSprite {
        &mut self.owner
    }

    /// Add a participant. Never duplicates: returns `false` if `key` is
    /// already present (or is the owner).
    pub fn add_player(&mut self, key: &str, snapshot: PlayerSnapshot) -> bool {
        if key == self.owner.session_id || self.players.contains_key(key) {
            return false;
        }
        self.players
            .insert(key.to_string(), PlayerSprite::new(key, snapshot));
        true
    }

    /// Add `key` or move it to `snapshot` if it is already present.
    pub fn place(&mut self, key: &str, snapshot: PlayerSnapshot) {
        if key == self.owner.session_id {
            return;
        }
        match self.players.get_mut(key) {
            Some(sprite) => {
                sprite.x = snapshot.x;
                sprite.y = snapshot.y;
                sprite.dir = snapshot.dir;
            }
            None => {
                self.players
                    .insert(key.to_string(), PlayerSprite::new(key, snapshot));
            }
        }
    }

    /// Movement/animation update for an already materialized participant.
    pub fn run_player_animation(&mut self, key: &str, state: &PlayerState) -> bool {
        let Some(sprite) = self.players.get_mut(key) else {
            return false;
        };
        sprite.x = state.x;
        sprite.y = state.y;
        sprite.dir = state.dir.clone();
        sprite.moves += 1;
        true
    }

    pub fn remove_player(&mut self, key: &str) -> bool {
        self.players.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.players.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PlayerSprite> {
        self.players.get(key)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Remote participants, sorted by session id.
    pub fn players(&self) -> Vec<&PlayerSprite> {
        let mut v: Vec<_> = self.players.values().collect();
        v.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        v
    }
}

// ---------------------------------------------------------------------------
// Presentation contexts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    /// Registered, never started.
    Pending,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    Loading,
    Complete,
}

/// Loading-stage data: what must be fetched before the room is playable.
#[derive(Debug, Clone)]
pub struct LoadingStage {
    pub map: String,
    pub images: Vec<String>,
    pub preload_assets: Vec<crate::protocol::PreloadAsset>,
    pub animations: serde_json::Value,
    /// This stage must build the shared UI surface.
    pub creates_ui: bool,
    pub ui: Option<UiSurface>,
    pub preload: PreloadState,
}

#[derive(Debug, Clone)]
pub enum ContextKind {
    Loading(LoadingStage),
    Playable,
    /// Registered by `ensure_context` ahead of bootstrap; not playable until
    /// promoted.
    Placeholder,
}

/// Renderable state for one context key.
#[derive(Debug, Clone)]
pub struct PresentationContext {
    key: String,
    kind: ContextKind,
    descriptor: Arc<RoomDescriptor>,
    status: SceneStatus,
    map_loaded: bool,
    players: Option<PlayerContainer>,
}

impl PresentationContext {
    pub fn loading(
        key: impl Into<String>,
        descriptor: Arc<RoomDescriptor>,
        creates_ui: bool,
        ui_config: &UiConfig,
    ) -> Self {
        let stage = LoadingStage {
            map: descriptor.room_map.clone(),
            images: descriptor.scene_images.clone(),
            preload_assets: descriptor.preload_assets.clone(),
            animations: descriptor.objects_animations_data.clone(),
            creates_ui,
            ui: creates_ui.then(|| UiSurface::from_config(ui_config)),
            preload: PreloadState::Loading,
        };
        Self {
            key: key.into(),
            kind: ContextKind::Loading(stage),
            descriptor,
            status: SceneStatus::Pending,
            map_loaded: false,
            players: None,
        }
    }

    /// A playable context with no container yet.
    pub fn playable(key: impl Into<String>, descriptor: Arc<RoomDescriptor>) -> Self {
        Self::with_kind(key, ContextKind::Playable, descriptor)
    }

    pub fn placeholder(key: impl Into<String>, descriptor: Arc<RoomDescriptor>) -> Self {
        Self::with_kind(key, ContextKind::Placeholder, descriptor)
    }

    fn with_kind(key: impl Into<String>, kind: ContextKind, descriptor: Arc<RoomDescriptor>) -> Self {
        Self {
            key: key.into(),
            kind,
            descriptor,
            status: SceneStatus::Pending,
            map_loaded: false,
            players: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, ContextKind::Placeholder)
    }

    /// Turn a placeholder into a playable context for `descriptor`.
    /// Returns `false` for any other kind.
    pub fn promote(&mut self, descriptor: Arc<RoomDescriptor>) -> bool {
        if !self.is_placeholder() {
            return false;
        }
        self.kind = ContextKind::Playable;
        self.descriptor = descriptor;
        true
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn descriptor(&self) -> &RoomDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> SceneStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SceneStatus::Running
    }

    pub fn map_loaded(&self) -> bool {
        self.map_loaded
    }

    pub fn loading_stage(&self) -> Option<&LoadingStage> {
        match &self.kind {
            ContextKind::Loading(stage) => Some(stage),
            ContextKind::Playable | ContextKind::Placeholder => None,
        }
    }

    pub fn loading_stage_mut(&mut self) -> Option<&mut LoadingStage> {
        match &mut self.kind {
            ContextKind::Loading(stage) => Some(stage),
            ContextKind::Playable | ContextKind::Placeholder => None,
        }
    }

    pub fn players(&self) -> Option<&PlayerContainer> {
        self.players.as_ref()
    }

    pub fn players_mut(&mut self) -> Option<&mut PlayerContainer> {
        self.players.as_mut()
    }

    pub fn set_players(&mut self, container: PlayerContainer) {
        self.players = Some(container);
    }

    /// Teardown hook run before the context is stopped for a room switch:
    /// releases the map/tileset.
    pub fn change_scene(&mut self) {
        self.map_loaded = false;
    }

    fn on_start(&mut self) {
        self.status = SceneStatus::Running;
        if matches!(self.kind, ContextKind::Playable) {
            self.map_loaded = true;
        }
    }

    fn on_stop(&mut self) {
        self.status = SceneStatus::Stopped;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry operations the core consumes.
pub trait SceneRegistry: Send {
    fn get(&self, key: &str) -> Option<&PresentationContext>;
    fn get_mut(&mut self, key: &str) -> Option<&mut PresentationContext>;

    /// Register `context` (optionally starting it). Returns `false` and keeps
    /// the existing one if the key is already taken.
    fn add(&mut self, context: PresentationContext, autostart: bool) -> bool;

    fn start(&mut self, key: &str) -> bool;
    fn stop(&mut self, key: &str) -> bool;

    /// Run the teardown hook of `key`.
    fn tear_down(&mut self, key: &str) -> bool;

    fn keys(&self) -> Vec<String>;

    /// Registry operations in the order they happened.
    fn history(&self) -> &[SceneOp];

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneOp {
    Added(String),
    Started(String),
    Stopped(String),
    TornDown(String),
}

/// In-process registry with an operation history.
#[derive(Debug, Default)]
pub struct SceneManager {
    contexts: HashMap<String, PresentationContext>,
    history: Vec<SceneOp>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn running(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .contexts
            .values()
            .filter(|c| c.is_running())
            .map(|c| c.key())
            .collect();
        keys.sort();
        keys
    }
}

impl SceneRegistry for SceneManager {
    fn get(&self, key: &str) -> Option<&PresentationContext> {
        self.contexts.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut PresentationContext> {
        self.contexts.get_mut(key)
    }

    fn add(&mut self, context: PresentationContext, autostart: bool) -> bool {
        if self.contexts.contains_key(context.key()) {
            debug!("scene '{}' already registered", context.key());
            return false;
        }
        let key = context.key().to_string();
        self.contexts.insert(key.clone(), context);
        self.history.push(SceneOp::Added(key.clone()));
        if autostart {
            self.start(&key);
        }
        true
    }

    fn start(&mut self, key: &str) -> bool {
        let Some(ctx) = self.contexts.get_mut(key) else {
            return false;
        };
        ctx.on_start();
        self.history.push(SceneOp::Started(key.to_string()));
        true
    }

    fn stop(&mut self, key: &str) -> bool {
        let Some(ctx) = self.contexts.get_mut(key) else {
            return false;
        };
        ctx.on_stop();
        self.history.push(SceneOp::Stopped(key.to_string()));
        true
    }

    fn tear_down(&mut self, key: &str) -> bool {
        let Some(ctx) = self.contexts.get_mut(key) else {
            return false;
        };
        ctx.change_scene();
        self.history.push(SceneOp::TornDown(key.to_string()));
        true
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.contexts.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn history(&self) -> &[SceneOp] {
        &self.history
    }
}
