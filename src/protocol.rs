//! Room message vocabulary and the room descriptor payload.
//!
//! This module owns **every shape the client reads from or writes to a room**:
//! control messages pushed by the server, the messages the client sends back,
//! and the serialized room descriptor carried on the room state.
//!
//! ## Directions
//!
//! | Type              | Direction       | Carried by                    |
//! |-------------------|-----------------|-------------------------------|
//! | `RoomMessage`     | server → client | room `onMessage` callback     |
//! | `OutboundMessage` | client → server | room `send` primitive         |
//! | `RoomDescriptor`  | server → client | string field on room state    |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize`; descriptor fields are camelCase
//!    on the wire.
//! 2. Act codes are opaque to the core; compare against [`acts`] only.
//! 3. Optional message fields stay `Option`; reactions decide what is required.

use serde::{Deserialize, Serialize};

use crate::types::PlayerSnapshot;

/// Default prefix of loading-stage context keys.
pub const SCENE_PRELOADER: &str = "ScenePreloader";

// ---------------------------------------------------------------------------
// Act codes
// ---------------------------------------------------------------------------

/// Control message act codes.
pub mod acts {
    /// Another room announces a participant moved into this room.
    pub const CHANGED_SCENE: &str = "cs";
    /// Server asks this client to reconnect (room switch).
    pub const RECONNECT: &str = "r";
    /// Stats push (server → client) and stats request (client → server).
    pub const PLAYER_STATS: &str = "ps";
    /// Client finished building its playable context.
    pub const CLIENT_JOINED: &str = "cj";
}

/// Room leave codes.
pub mod close_codes {
    /// Normal, client-initiated closure. Anything above is abnormal.
    pub const NORMAL: u16 = 1000;
    pub const ABNORMAL: u16 = 1006;
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Free-form message pushed by the room.
///
/// Only `act` is always present; the rest depend on the act.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub act: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

impl RoomMessage {
    pub fn new(act: impl Into<String>) -> Self {
        Self {
            act: act.into(),
            ..Default::default()
        }
    }

    pub fn changed_scene(
        scene: impl Into<String>,
        id: impl Into<String>,
        snapshot: PlayerSnapshot,
    ) -> Self {
        Self {
            act: acts::CHANGED_SCENE.into(),
            scene: Some(scene.into()),
            id: Some(id.into()),
            x: Some(snapshot.x),
            y: Some(snapshot.y),
            dir: Some(snapshot.dir),
            stats: None,
        }
    }

    pub fn player_stats(stats: serde_json::Value) -> Self {
        Self {
            act: acts::PLAYER_STATS.into(),
            stats: Some(stats),
            ..Default::default()
        }
    }

    /// Position carried by the message, if all three fields are present.
    pub fn snapshot(&self) -> Option<PlayerSnapshot> {
        match (self.x, self.y, &self.dir) {
            (Some(x), Some(y), Some(dir)) => Some(PlayerSnapshot::new(x, y, dir.clone())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub act: String,
}

impl OutboundMessage {
    pub fn new(act: impl Into<String>) -> Self {
        Self { act: act.into() }
    }
}

// ---------------------------------------------------------------------------
// Room descriptor  (serialized on the room state)
// ---------------------------------------------------------------------------

/// One asset the loading stage must fetch before the room becomes playable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadAsset {
    pub asset_type: String,
    pub asset_key: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<serde_json::Value>,
}

/// Static room metadata, parsed once per payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDescriptor {
    pub room_id: u64,
    pub room_name: String,
    pub room_title: String,
    pub room_map: String,
    pub scene_images: Vec<String>,
    pub preload_assets: Vec<PreloadAsset>,
    /// Animation metadata for room objects; opaque to the client core.
    pub objects_animations_data: serde_json::Value,
}

impl RoomDescriptor {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
