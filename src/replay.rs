//! Scenario replay – drives recorded room traffic through the sync core.
//!
//! A [`Scenario`] lists the rooms a client can join and an ordered series of
//! steps (joins, entity lifecycle events, messages, leaves). [`run`] feeds the
//! steps to in-memory rooms on a single task. Preloads complete after a delay
//! by posting back into the loop's channel, so remote events that arrive
//! before a preload finishes are buffered exactly as they would be live.
//!
//! ## Scenario file
//!
//! ```json
//! {
//!   "session_id": "me",
//!   "rooms": { "town": { "descriptor": { "roomName": "town" }, "roster": [] } },
//!   "steps": [
//!     { "type": "join", "room": "town" },
//!     { "type": "entity_added", "room": "town", "entity": { ... } },
//!     { "type": "settle" }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn};

use crate::error::SyncError;
use crate::protocol::{RoomDescriptor, RoomMessage};
use crate::room::MemoryRoom;
use crate::room_events::RoomEvents;
use crate::scene::SceneManager;
use crate::session::{AssetLoader, GameSession, PreloadRequest, RecordingShell, SharedSession};
use crate::types::{ClientConfig, RemoteEntityState};

// ---------------------------------------------------------------------------
// Scenario model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Local session id, shared by every room the client joins.
    pub session_id: String,
    #[serde(default)]
    pub rooms: BTreeMap<String, RoomSetup>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomSetup {
    #[serde(default)]
    pub descriptor: RoomDescriptor,
    /// Entities already in the room when the client joins; announced as
    /// added-events right after activation, in this order.
    #[serde(default)]
    pub roster: Vec<RemoteEntityState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Join {
        room: String,
        #[serde(default)]
        previous_scene: Option<String>,
    },
    EntityAdded {
        room: String,
        entity: RemoteEntityState,
    },
    EntityChanged {
        room: String,
        entity: RemoteEntityState,
    },
    EntityRemoved {
        room: String,
        id: String,
    },
    Message {
        room: String,
        message: RoomMessage,
    },
    Leave {
        room: String,
        code: u16,
    },
    /// Wait for every in-flight preload to complete.
    Settle,
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Step::Join { .. } => "join",
            Step::EntityAdded { .. } => "entity_added",
            Step::EntityChanged { .. } => "entity_changed",
            Step::EntityRemoved { .. } => "entity_removed",
            Step::Message { .. } => "message",
            Step::Leave { .. } => "leave",
            Step::Settle => "settle",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// How long each preload takes.
    pub preload_delay: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            preload_delay: Duration::from_millis(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub active_room: Option<String>,
    pub scenes: Vec<SceneReport>,
    pub rooms: BTreeMap<String, RoomReport>,
    pub ui: Option<UiReport>,
    pub fatal: Vec<String>,
    pub reports: Vec<String>,
    /// Rooms that received a reconnect directive.
    pub reconnects: Vec<String>,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub key: String,
    pub status: String,
    pub map_loaded: bool,
    pub players: Vec<PlayerReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomReport {
    pub state: String,
    pub sent: Vec<String>,
    pub closed_with: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiReport {
    pub player_name: Option<String>,
    pub scene_title: Option<String>,
    pub stats: Option<String>,
}

impl ReplayReport {
    pub fn scene(&self, key: &str) -> Option<&SceneReport> {
        self.scenes.iter().find(|s| s.key == key)
    }
}

// ---------------------------------------------------------------------------
// Deferred loader
// ---------------------------------------------------------------------------

enum LoopEvent {
    PreloadComplete { key: String },
}

/// Completes each preload after a fixed delay by posting into the loop.
struct DeferredLoader {
    tx: mpsc::UnboundedSender<LoopEvent>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl AssetLoader for DeferredLoader {
    fn begin(&self, request: PreloadRequest) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!(
            key = %request.key,
            map = %request.map,
            assets = request.assets.len(),
            "preload started"
        );
        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(LoopEvent::PreloadComplete { key: request.key }).is_err() {
                debug!("replay loop gone, preload result dropped");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

struct Runner {
    session_id: String,
    setups: BTreeMap<String, RoomSetup>,
    session: SharedSession,
    shell: Arc<RecordingShell>,
    rooms: HashMap<String, Arc<MemoryRoom>>,
    events: BTreeMap<String, Arc<Mutex<RoomEvents>>>,
    in_flight: Arc<AtomicUsize>,
    rx: mpsc::UnboundedReceiver<LoopEvent>,
}

/// Replay `scenario` and report where the client ended up.
///
/// Stops at the first step that names a room the scenario does not define
/// (or has not joined yet).
pub async fn run(
    scenario: Scenario,
    config: ClientConfig,
    options: ReplayOptions,
) -> Result<ReplayReport, SyncError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let shell = Arc::new(RecordingShell::new());
    let loader = Arc::new(DeferredLoader {
        tx,
        delay: options.preload_delay,
        in_flight: in_flight.clone(),
    });
    let session = GameSession::new(config, Box::new(SceneManager::new()), loader, shell.clone())
        .into_shared();

    let mut runner = Runner {
        session_id: scenario.session_id,
        setups: scenario.rooms,
        session,
        shell,
        rooms: HashMap::new(),
        events: BTreeMap::new(),
        in_flight,
        rx,
    };

    info!(steps = scenario.steps.len(), "replay started");
    for (index, step) in scenario.steps.into_iter().enumerate() {
        if let Step::Settle = step {
            runner.settle().await;
            continue;
        }
        let span = info_span!("step", index, kind = step.kind());
        span.in_scope(|| runner.apply(step))?;
        runner.drain_ready();
    }
    runner.settle().await;

    Ok(runner.report())
}

impl Runner {
    fn apply(&mut self, step: Step) -> Result<(), SyncError> {
        match step {
            Step::Join {
                room,
                previous_scene,
            } => self.join(&room, previous_scene),
            Step::EntityAdded { room, entity } => {
                self.room(&room)?.add_player(entity);
                Ok(())
            }
            Step::EntityChanged { room, entity } => {
                self.room(&room)?.change_player(entity);
                Ok(())
            }
            Step::EntityRemoved { room, id } => {
                self.room(&room)?.remove_player(&id);
                Ok(())
            }
            Step::Message { room, message } => {
                self.room(&room)?.push_message(message);
                Ok(())
            }
            Step::Leave { room, code } => {
                self.room(&room)?.leave(code);
                Ok(())
            }
            Step::Settle => Ok(()),
        }
    }

    fn room(&self, name: &str) -> Result<Arc<MemoryRoom>, SyncError> {
        self.rooms
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownRoom(name.to_string()))
    }

    fn join(&mut self, name: &str, previous_scene: Option<String>) -> Result<(), SyncError> {
        let setup = self
            .setups
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownRoom(name.to_string()))?;
        let payload = setup
            .descriptor
            .to_payload()
            .map_err(|source| SyncError::Descriptor {
                room: name.to_string(),
                source,
            })?;

        let room = Arc::new(MemoryRoom::new(name, self.session_id.clone(), payload));
        let events = RoomEvents::new(name, self.session.clone()).activate(room.clone(), previous_scene);
        self.rooms.insert(name.to_string(), room.clone());
        self.events.insert(name.to_string(), events);
        info!(room = name, roster = setup.roster.len(), "joined");

        for entity in setup.roster {
            room.add_player(entity);
        }
        Ok(())
    }

    fn complete(&mut self, key: &str) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _span = info_span!("preload_complete", key).entered();
        for events in self.events.values() {
            if events.lock().on_preload_complete(key) {
                return;
            }
        }
        warn!(key, "preload completed with no room waiting on it");
    }

    /// Handle completions that are already queued, without waiting.
    fn drain_ready(&mut self) {
        while let Ok(LoopEvent::PreloadComplete { key }) = self.rx.try_recv() {
            self.complete(&key);
        }
    }

    async fn settle(&mut self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            match self.rx.recv().await {
                Some(LoopEvent::PreloadComplete { key }) => self.complete(&key),
                None => break,
            }
        }
    }

    fn report(&self) -> ReplayReport {
        // room sessions lock the session themselves; read them first
        let rooms = self
            .events
            .iter()
            .map(|(name, events)| {
                let room = self.rooms.get(name);
                (
                    name.clone(),
                    RoomReport {
                        state: events.lock().state().name().to_string(),
                        sent: room
                            .map(|r| r.sent().into_iter().map(|m| m.act).collect())
                            .unwrap_or_default(),
                        closed_with: room.and_then(|r| r.closed_with()),
                    },
                )
            })
            .collect();

        let session = self.session.lock();
        let scenes = session.scenes();

        let scene_reports = scenes
            .keys()
            .into_iter()
            .filter_map(|key| scenes.get(&key))
            .map(|ctx| SceneReport {
                key: ctx.key().to_string(),
                status: format!("{:?}", ctx.status()),
                map_loaded: ctx.map_loaded(),
                players: ctx
                    .players()
                    .map(|c| {
                        c.players()
                            .into_iter()
                            .map(|p| PlayerReport {
                                id: p.session_id.clone(),
                                x: p.x,
                                y: p.y,
                                dir: p.dir.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        ReplayReport {
            active_room: session.active_room().map(str::to_string),
            scenes: scene_reports,
            rooms,
            ui: session.ui().map(|ui| UiReport {
                player_name: ui.player_name().map(str::to_string),
                scene_title: ui.scene_title().map(str::to_string),
                stats: ui.stats_text().map(str::to_string),
            }),
            fatal: self
                .shell
                .fatal_conditions()
                .iter()
                .map(ToString::to_string)
                .collect(),
            reports: self.shell.reports(),
            reconnects: self.shell.reconnects().into_iter().map(|(room, _)| room).collect(),
            history: scenes.history().iter().map(|op| format!("{:?}", op)).collect(),
        }
    }
}
