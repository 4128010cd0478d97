//! Core client types shared across all modules.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position snapshot
// ---------------------------------------------------------------------------

/// Position and facing of one participant at a point in time.
///
/// This is the only part of a remote entity the client needs to place or
/// move a sprite, and the unit held by the pending snapshot queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    pub dir: String,
}

impl PlayerSnapshot {
    pub fn new(x: f32, y: f32, dir: impl Into<String>) -> Self {
        Self {
            x,
            y,
            dir: dir.into(),
        }
    }
}

impl std::fmt::Display for PlayerSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1}, {})", self.x, self.y, self.dir)
    }
}

// ---------------------------------------------------------------------------
// Remote entity state (authoritative, read-only on the client)
// ---------------------------------------------------------------------------

/// Per-participant state as mirrored from the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Room assignment ("scene") the participant currently belongs to.
    pub scene: String,
    pub x: f32,
    pub y: f32,
    pub dir: String,
}

impl PlayerState {
    pub fn new(scene: impl Into<String>, x: f32, y: f32, dir: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            x,
            y,
            dir: dir.into(),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot::new(self.x, self.y, self.dir.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntityState {
    pub session_id: String,
    #[serde(default)]
    pub username: String,
    pub state: PlayerState,
    /// Opaque stats payload; only the stats reaction looks inside.
    #[serde(default)]
    pub stats: serde_json::Value,
}

impl RemoteEntityState {
    pub fn new(session_id: impl Into<String>, username: impl Into<String>, state: PlayerState) -> Self {
        Self {
            session_id: session_id.into(),
            username: username.into(),
            state,
            stats: serde_json::Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Which UI regions a freshly created shared UI surface gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Right-side box holding the local player's name.
    pub right_box: bool,
    /// Label showing the current room title.
    pub scene_label: bool,
    /// Stats panel re-rendered on every stats push.
    pub player_stats: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            right_box: true,
            scene_label: true,
            player_stats: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for loading-stage context keys (`<prefix><roomName>`).
    pub scene_preloader_prefix: String,
    pub ui: UiConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scene_preloader_prefix: crate::protocol::SCENE_PRELOADER.into(),
            ui: UiConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn preloader_key(&self, room_name: &str) -> String {
        format!("{}{}", self.scene_preloader_prefix, room_name)
    }
}
