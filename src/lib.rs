//! Room Sync
//!
//! Client-side reconciliation of a multiplayer room: keeps the local
//! presentation of "who is in this room and where" in step with the
//! authoritative room state, and orchestrates the scene transitions a client
//! goes through when it joins or switches rooms.
//!
//! ## Architecture
//!
//! ```text
//! RoomHandle  (room.rs)  ── entity / message / leave events ──▶ RoomEvents  (room_events.rs)
//!                                                                 ├── SyncState + PendingSnapshotQueue (pending.rs)
//!                                                                 ├── message dispatch  (dispatch.rs)
//!                                                                 └── bootstrap / transitions  (bootstrap.rs)
//!                                                                       └── GameSession  (session.rs)
//!                                                                             ├── SceneRegistry → PresentationContext (scene.rs)
//!                                                                             ├── UiSurface (ui.rs)
//!                                                                             └── AssetLoader / SessionShell
//! ```
//!
//! Everything process-wide (scene registry, shared UI, active room pointer)
//! lives in one [`GameSession`] handed to every [`RoomEvents`]; nothing is
//! global. The `replay` feature adds a tokio-driven scenario runner and the
//! `room-sync-replay` binary.

// Core modules are always available.
pub mod bootstrap;
pub mod dispatch;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod room;
pub mod room_events;
pub mod scene;
pub mod session;
pub mod types;
pub mod ui;

// Scenario replay requires the `replay` feature.
#[cfg(feature = "replay")]
pub mod replay;

pub use dispatch::MessageObserver;
pub use error::{FatalCondition, SyncError};
pub use pending::{PendingSnapshotQueue, SyncState};
pub use protocol::{acts, close_codes, OutboundMessage, RoomDescriptor, RoomMessage};
pub use room::{MemoryRoom, RoomEventSink, RoomHandle};
pub use room_events::RoomEvents;
pub use scene::{PlayerContainer, PresentationContext, SceneManager, SceneRegistry};
pub use session::{AssetLoader, Feature, GameSession, SessionShell, SharedSession};
pub use types::{ClientConfig, PlayerSnapshot, PlayerState, RemoteEntityState, UiConfig};

#[cfg(feature = "replay")]
pub use replay::{ReplayOptions, ReplayReport, Scenario};
