//! Presentation bootstrap and the transition controller.
//!
//! Both run with the session locked and the room session's state already
//! moved out, so they only ever see `&mut GameSession`.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::error::SyncError;
use crate::protocol::{acts, OutboundMessage, RoomDescriptor};
use crate::room::RoomHandle;
use crate::scene::{PlayerContainer, PreloadState, PresentationContext};
use crate::session::{GameSession, PreloadRequest};
use crate::types::RemoteEntityState;
use crate::ui::elements;

/// How a bootstrap call left things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A preload was started; resume with [`complete_preload`] for `preloader`.
    Preloading { preloader: String },
    /// The playable context is built and active.
    Completed,
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Bring up the presentation for the local player's entry into `room`.
pub fn start_engine_scene(
    session: &mut GameSession,
    room: &dyn RoomHandle,
    player: &RemoteEntityState,
    previous_scene: Option<&str>,
    descriptor: &Arc<RoomDescriptor>,
) -> Result<BootstrapOutcome, SyncError> {
    let preloader = session.config().preloader_key(&descriptor.room_name);

    let scene_loaded = session
        .scenes
        .get(&player.state.scene)
        .is_some_and(|ctx| !ctx.is_placeholder());
    if session.scenes.contains(&preloader) || scene_loaded {
        debug!(
            "[{}] '{}' already loaded, skipping preload",
            room.name(),
            player.state.scene
        );
        create_engine_scene(session, room, player, previous_scene, descriptor)?;
        return Ok(BootstrapOutcome::Completed);
    }

    let creates_ui = session.ui.is_none();
    let context = PresentationContext::loading(
        preloader.clone(),
        descriptor.clone(),
        creates_ui,
        &session.config().ui,
    );
    session.scenes.add(context, true);

    info!(
        "[{}] preloading '{}' ({} assets, ui={})",
        room.name(),
        preloader,
        descriptor.preload_assets.len(),
        creates_ui
    );
    session.loader.begin(PreloadRequest {
        key: preloader.clone(),
        room_name: descriptor.room_name.clone(),
        map: descriptor.room_map.clone(),
        images: descriptor.scene_images.clone(),
        assets: descriptor.preload_assets.clone(),
    });

    Ok(BootstrapOutcome::Preloading { preloader })
}

/// Resume a bootstrap once the loader reports `preloader` done.
pub fn complete_preload(
    session: &mut GameSession,
    room: &dyn RoomHandle,
    player: &RemoteEntityState,
    previous_scene: Option<&str>,
    descriptor: &Arc<RoomDescriptor>,
    preloader: &str,
) -> Result<(), SyncError> {
    let loaded_ui = {
        let stage = session
            .scenes
            .get_mut(preloader)
            .and_then(|ctx| ctx.loading_stage_mut())
            .ok_or_else(|| SyncError::UnknownPreload(preloader.to_string()))?;
        if stage.preload == PreloadState::Complete {
            return Err(SyncError::UnknownPreload(preloader.to_string()));
        }
        stage.preload = PreloadState::Complete;
        stage.ui.take()
    };

    // first loading stage to finish owns the shared UI
    if session.ui.is_none() {
        if let Some(mut ui) = loaded_ui {
            if let Some(right_box) = ui.right_box.as_mut() {
                right_box.set_text(elements::PLAYER_NAME, player.username.clone());
            }
            session.ui = Some(ui);
        }
    }

    create_engine_scene(session, room, player, previous_scene, descriptor)
}

// ---------------------------------------------------------------------------
// Transition controller
// ---------------------------------------------------------------------------

/// Make the playable context for `player.state.scene` the single active one
/// and populate it from the room roster.
pub fn create_engine_scene(
    session: &mut GameSession,
    room: &dyn RoomHandle,
    player: &RemoteEntityState,
    previous_scene: Option<&str>,
    descriptor: &Arc<RoomDescriptor>,
) -> Result<(), SyncError> {
    let scene = player.state.scene.as_str();

    match session.scenes.get_mut(scene) {
        Some(ctx) => {
            if ctx.promote(descriptor.clone()) {
                debug!("[{}] placeholder '{}' promoted", room.name(), scene);
            }
        }
        None => {
            session
                .scenes
                .add(PresentationContext::playable(scene, descriptor.clone()), false);
        }
    }

    match (session.active_room.as_deref(), previous_scene) {
        (None, _) => {
            session.scenes.start(scene);
        }
        (Some(_), Some(previous)) if session.scenes.contains(previous) => {
            session.scenes.tear_down(previous);
            session.scenes.stop(previous);
            session.scenes.start(scene);
            info!("switched scene '{}' -> '{}'", previous, scene);
        }
        (Some(active), previous) => {
            let err = SyncError::MissingPreviousScene {
                target: scene.to_string(),
                previous: previous.map(str::to_string),
                active: active.to_string(),
            };
            error!("{}", err);
            return Err(err);
        }
    }

    session.active_room = Some(room.name().to_string());

    let mut container = PlayerContainer::new(player, room.name());
    container.create();
    for other in room.players() {
        if other.session_id.is_empty() || other.session_id == room.session_id() {
            continue;
        }
        container.add_player(&other.session_id, other.state.snapshot());
    }
    let populated = container.len();
    if let Some(ctx) = session.scenes.get_mut(scene) {
        ctx.set_players(container);
    }

    if let Some(label) = session.ui.as_mut().and_then(|ui| ui.scene_label.as_mut()) {
        label.set_text(elements::SCENE_LABEL, descriptor.room_title.clone());
    }

    info!(
        "[{}] scene '{}' active with {} other players",
        room.name(),
        scene,
        populated
    );

    for act in [acts::PLAYER_STATS, acts::CLIENT_JOINED] {
        if let Err(e) = room.send(OutboundMessage::new(act)) {
            warn!("{}", e);
        }
    }

    Ok(())
}
