//! RoomEvents integration tests: join, buffering, transitions, messages.

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use room_sync::{
        acts, close_codes,
        scene::{SceneOp, SceneStatus},
        session::{RecordingLoader, RecordingShell},
        ClientConfig, FatalCondition, Feature, GameSession, MemoryRoom, MessageObserver,
        PlayerSnapshot, PlayerState, RemoteEntityState, RoomDescriptor, RoomEvents, RoomHandle,
        RoomMessage, SceneManager, SharedSession, SyncError,
    };
    use serde_json::json;
    use std::sync::Arc;

    struct Harness {
        session: SharedSession,
        shell: Arc<RecordingShell>,
        loader: Arc<RecordingLoader>,
    }

    fn harness() -> Harness {
        harness_with(|s| s)
    }

    fn harness_with(f: impl FnOnce(GameSession) -> GameSession) -> Harness {
        let shell = Arc::new(RecordingShell::new());
        let loader = Arc::new(RecordingLoader::new());
        let session = f(GameSession::new(
            ClientConfig::default(),
            Box::new(SceneManager::new()),
            loader.clone(),
            shell.clone(),
        ))
        .into_shared();
        Harness {
            session,
            shell,
            loader,
        }
    }

    fn payload(name: &str) -> String {
        RoomDescriptor {
            room_name: name.into(),
            room_title: format!("The {}", name),
            room_map: format!("{}-map", name),
            ..Default::default()
        }
        .to_payload()
        .unwrap()
    }

    fn join(h: &Harness, name: &str, previous: Option<&str>) -> (Arc<MemoryRoom>, Arc<Mutex<RoomEvents>>) {
        let room = Arc::new(MemoryRoom::new(name, "me", payload(name)));
        let events = RoomEvents::new(name, h.session.clone())
            .activate(room.clone(), previous.map(str::to_string));
        (room, events)
    }

    fn local(scene: &str) -> RemoteEntityState {
        RemoteEntityState::new("me", "ana", PlayerState::new(scene, 0.0, 0.0, "down"))
    }

    fn remote(id: &str, scene: &str, x: f32, y: f32, dir: &str) -> RemoteEntityState {
        RemoteEntityState::new(id, id, PlayerState::new(scene, x, y, dir))
    }

    fn preload(events: &Arc<Mutex<RoomEvents>>, room: &str) {
        assert!(events.lock().on_preload_complete(&format!("ScenePreloader{}", room)));
    }

    /// Enter `name` and finish its preload.
    fn ready(h: &Harness, name: &str) -> (Arc<MemoryRoom>, Arc<Mutex<RoomEvents>>) {
        let (room, events) = join(h, name, None);
        room.add_player(local(name));
        preload(&events, name);
        (room, events)
    }

    /// `(id, snapshot)` of every remote participant in `scene`'s container.
    fn members(h: &Harness, scene: &str) -> Option<Vec<(String, PlayerSnapshot)>> {
        let session = h.session.lock();
        let container = session.try_get_context(scene)?.players()?;
        let members = container
            .players()
            .into_iter()
            .map(|p| (p.session_id.clone(), p.snapshot()))
            .collect();
        Some(members)
    }

    // -----------------------------------------------------------------------
    // Join + buffering
    // -----------------------------------------------------------------------

    #[test]
    fn local_joins_empty_room() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(local("town"));

        assert!(events.lock().state().is_bootstrapping());
        assert_eq!(h.loader.requests().len(), 1);
        assert_eq!(h.loader.requests()[0].key, "ScenePreloadertown");
        // nothing is playable or sent before the preload completes
        assert!(members(&h, "town").is_none());
        assert!(room.sent().is_empty());

        preload(&events, "town");
        assert!(events.lock().state().is_ready());
        assert!(events.lock().pending().is_none());
        assert_eq!(members(&h, "town"), Some(vec![]));

        let sent: Vec<String> = room.sent().into_iter().map(|m| m.act).collect();
        assert_eq!(sent, vec![acts::PLAYER_STATS.to_string(), acts::CLIENT_JOINED.to_string()]);
        assert_eq!(h.session.lock().active_room(), Some("town"));
    }

    #[test]
    fn early_remote_is_buffered_then_drained() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(remote("r1", "town", 10.0, 5.0, "down"));
        assert_eq!(
            events.lock().pending().unwrap().get("r1"),
            Some(&PlayerSnapshot::new(10.0, 5.0, "down"))
        );

        room.add_player(local("town"));
        preload(&events, "town");

        assert_eq!(
            members(&h, "town"),
            Some(vec![("r1".to_string(), PlayerSnapshot::new(10.0, 5.0, "down"))])
        );
    }

    #[test]
    fn remote_added_during_preload_is_buffered() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(local("town"));
        room.add_player(remote("r2", "town", 3.0, 4.0, "left"));
        assert!(events.lock().pending().unwrap().contains("r2"));

        preload(&events, "town");
        assert_eq!(
            members(&h, "town"),
            Some(vec![("r2".to_string(), PlayerSnapshot::new(3.0, 4.0, "left"))])
        );
    }

    #[test]
    fn buffered_snapshot_wins_over_later_roster_state() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(remote("r1", "town", 10.0, 5.0, "down"));
        // roster moves on, but the changed-event has nothing to apply to yet
        room.change_player(remote("r1", "town", 11.0, 5.0, "down"));
        room.add_player(local("town"));
        preload(&events, "town");

        let m = members(&h, "town").unwrap();
        assert_eq!(m[0].1, PlayerSnapshot::new(10.0, 5.0, "down"));
    }

    #[test]
    fn remote_removed_before_bootstrap_never_appears() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(remote("r1", "town", 1.0, 1.0, "up"));
        room.remove_player("r1");
        room.add_player(local("town"));
        preload(&events, "town");
        assert_eq!(members(&h, "town"), Some(vec![]));
    }

    // -----------------------------------------------------------------------
    // Ready: changed / removed
    // -----------------------------------------------------------------------

    #[test]
    fn change_moves_existing_participant() {
        let h = harness();
        let (room, _events) = ready(&h, "town");
        room.add_player(remote("r1", "town", 10.0, 5.0, "down"));
        room.change_player(remote("r1", "town", 12.0, 5.0, "left"));

        let m = members(&h, "town").unwrap();
        assert_eq!(m, vec![("r1".to_string(), PlayerSnapshot::new(12.0, 5.0, "left"))]);

        let session = h.session.lock();
        let container = session.try_get_context("town").unwrap().players().unwrap();
        assert_eq!(container.get("r1").unwrap().moves, 1);
    }

    #[test]
    fn change_for_other_scene_or_unknown_player_is_ignored() {
        let h = harness();
        let (room, _events) = ready(&h, "town");
        room.add_player(remote("r1", "town", 1.0, 1.0, "up"));
        room.change_player(remote("r1", "forest", 9.0, 9.0, "up"));
        room.change_player(remote("ghost", "town", 9.0, 9.0, "up"));

        let m = members(&h, "town").unwrap();
        assert_eq!(m, vec![("r1".to_string(), PlayerSnapshot::new(1.0, 1.0, "up"))]);
        assert!(h.shell.reports().is_empty());
    }

    #[test]
    fn membership_follows_last_event() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.add_player(remote("r1", "town", 1.0, 1.0, "up"));
        room.change_player(remote("r1", "town", 2.0, 2.0, "up"));
        room.remove_player("r1");
        assert_eq!(members(&h, "town"), Some(vec![]));

        room.add_player(remote("r1", "town", 3.0, 3.0, "down"));
        room.change_player(remote("r1", "town", 4.0, 4.0, "right"));
        assert_eq!(
            members(&h, "town"),
            Some(vec![("r1".to_string(), PlayerSnapshot::new(4.0, 4.0, "right"))])
        );
    }

    #[test]
    fn remote_in_other_scene_is_not_added() {
        let h = harness();
        let (room, _events) = ready(&h, "town");
        room.add_player(remote("r1", "forest", 1.0, 1.0, "up"));
        assert_eq!(members(&h, "town"), Some(vec![]));
    }

    #[test]
    fn self_removal_is_fatal_exactly_once() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.remove_player("me");
        // re-added and removed again by a confused server
        room.add_player(local("town"));
        room.remove_player("me");

        assert_eq!(h.shell.fatal_conditions(), vec![FatalCondition::SessionEnded]);
        // the local entity is never materialized as a remote participant
        assert_eq!(members(&h, "town"), Some(vec![]));
    }

    #[test]
    fn duplicate_local_add_is_ignored() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(local("town"));
        room.add_player(local("town"));
        assert_eq!(h.loader.requests().len(), 1);
        assert!(events.lock().state().is_bootstrapping());
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    #[test]
    fn switch_rooms_stops_old_and_repopulates_new() {
        let h = harness();
        let (town, _town_events) = ready(&h, "town");
        town.add_player(remote("r1", "town", 1.0, 1.0, "up"));

        let (forest, forest_events) = join(&h, "forest", Some("town"));
        forest.add_player(remote("r2", "forest", 7.0, 8.0, "down"));
        forest.add_player(local("forest"));
        // second loading stage does not build another UI surface
        {
            let session = h.session.lock();
            let stage = session
                .try_get_context("ScenePreloaderforest")
                .and_then(|c| c.loading_stage())
                .unwrap();
            assert!(!stage.creates_ui);
        }
        preload(&forest_events, "forest");

        let session = h.session.lock();
        let town_ctx = session.try_get_context("town").unwrap();
        assert_eq!(town_ctx.status(), SceneStatus::Stopped);
        assert!(!town_ctx.map_loaded());
        assert!(session.try_get_context("forest").unwrap().is_running());
        assert_eq!(session.active_room(), Some("forest"));

        let ui = session.ui().unwrap();
        assert_eq!(ui.player_name(), Some("ana"));
        assert_eq!(ui.scene_title(), Some("The forest"));

        let forest_players = session.try_get_context("forest").unwrap().players().unwrap();
        assert_eq!(forest_players.len(), 1);
        assert!(forest_players.contains("r2"));
        assert!(!forest_players.contains("me"));
    }

    #[test]
    fn returning_to_a_room_reuses_its_contexts() {
        let h = harness();
        let (_town, _e1) = ready(&h, "town");

        let (forest, forest_events) = join(&h, "forest", Some("town"));
        forest.add_player(local("forest"));
        preload(&forest_events, "forest");

        // contexts for town already exist: no second preload
        let (town_again, events_again) = join(&h, "town", Some("forest"));
        town_again.add_player(local("town"));
        assert!(events_again.lock().state().is_ready());
        assert_eq!(h.loader.requests().len(), 2);

        let session = h.session.lock();
        let added_town = session
            .scenes()
            .history()
            .iter()
            .filter(|op| **op == SceneOp::Added("town".into()))
            .count();
        assert_eq!(added_town, 1);
        assert!(session.try_get_context("town").unwrap().is_running());
        assert!(!session.try_get_context("forest").unwrap().is_running());
    }

    #[test]
    fn switch_with_unknown_previous_is_reported() {
        let h = harness();
        let (_town, _town_events) = ready(&h, "town");

        let (forest, events) = join(&h, "forest", Some("cave"));
        forest.add_player(local("forest"));
        preload(&events, "forest");

        let reports = h.shell.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("cave"));
        assert_eq!(events.lock().state().name(), "loading");

        let session = h.session.lock();
        assert!(!session.try_get_context("forest").unwrap().is_running());
        assert!(session.try_get_context("town").unwrap().is_running());
        assert_eq!(session.active_room(), Some("town"));
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    #[test]
    fn scene_change_notice_and_added_never_duplicate() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.push_message(RoomMessage::changed_scene("town", "r9", PlayerSnapshot::new(5.0, 6.0, "up")));
        room.add_player(remote("r9", "town", 5.0, 6.0, "up"));
        assert_eq!(members(&h, "town").unwrap().len(), 1);

        room.add_player(remote("r8", "town", 1.0, 2.0, "down"));
        room.push_message(RoomMessage::changed_scene("town", "r8", PlayerSnapshot::new(1.0, 2.0, "down")));
        assert_eq!(members(&h, "town").unwrap().len(), 2);
    }

    #[test]
    fn notice_before_local_entity_still_preloads() {
        let h = harness();
        let (room, events) = join(&h, "town", None);
        room.add_player(remote("r1", "town", 1.0, 1.0, "up"));
        room.push_message(RoomMessage::changed_scene("town", "r2", PlayerSnapshot::new(2.0, 2.0, "down")));
        room.add_player(local("town"));

        assert!(events.lock().state().is_bootstrapping());
        assert_eq!(h.loader.requests().len(), 1);
        preload(&events, "town");

        let session = h.session.lock();
        let ui = session.ui().unwrap();
        assert_eq!(ui.player_name(), Some("ana"));
        assert_eq!(ui.scene_title(), Some("The town"));
        let town = session.try_get_context("town").unwrap();
        assert!(town.is_running());
        assert!(town.map_loaded());
        assert!(town.players().unwrap().contains("r1"));
    }

    #[test]
    fn scene_change_notice_guards() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        // for another room
        room.push_message(RoomMessage::changed_scene("forest", "r1", PlayerSnapshot::new(0.0, 0.0, "up")));
        // self-originated
        room.push_message(RoomMessage::changed_scene("town", "me", PlayerSnapshot::new(0.0, 0.0, "up")));
        assert_eq!(members(&h, "town"), Some(vec![]));

        room.push_message(RoomMessage::changed_scene("town", "r1", PlayerSnapshot::new(2.0, 3.0, "left")));
        assert_eq!(
            members(&h, "town"),
            Some(vec![("r1".to_string(), PlayerSnapshot::new(2.0, 3.0, "left"))])
        );
    }

    #[test]
    fn stats_push_updates_sprite_and_panel_every_time() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.push_message(RoomMessage::player_stats(json!({"hp": 100, "mp": 20})));
        room.push_message(RoomMessage::player_stats(json!({"hp": 80, "mp": 20})));

        let session = h.session.lock();
        let owner = session
            .try_get_context("town")
            .and_then(|c| c.players())
            .unwrap()
            .owner();
        assert_eq!(owner.stats, json!({"hp": 80, "mp": 20}));
        assert_eq!(session.ui().unwrap().stats_text(), Some("hp: 80\nmp: 20"));
    }

    #[test]
    fn stats_push_without_payload_keeps_previous_stats() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.push_message(RoomMessage::player_stats(json!({"hp": 100})));
        room.push_message(RoomMessage::new(acts::PLAYER_STATS));

        let session = h.session.lock();
        let owner = session
            .try_get_context("town")
            .and_then(|c| c.players())
            .unwrap()
            .owner();
        assert_eq!(owner.stats, json!({"hp": 100}));
        assert_eq!(session.ui().unwrap().stats_text(), Some("hp: 100"));
    }

    #[test]
    fn stats_push_before_ui_is_harmless() {
        let h = harness();
        let (room, _events) = join(&h, "town", None);
        room.push_message(RoomMessage::player_stats(json!({"hp": 1})));
        assert!(h.session.lock().ui().is_none());
        assert!(h.shell.reports().is_empty());
    }

    #[test]
    fn reconnect_reaches_the_shell() {
        let h = harness();
        let (room, _events) = ready(&h, "town");
        room.push_message(RoomMessage::new(acts::RECONNECT));
        let reconnects = h.shell.reconnects();
        assert_eq!(reconnects.len(), 1);
        assert_eq!(reconnects[0].0, "town");
        assert_eq!(reconnects[0].1.act, acts::RECONNECT);
    }

    #[test]
    fn leave_codes() {
        let h = harness();
        let (room, _events) = ready(&h, "town");

        room.leave(close_codes::NORMAL);
        assert!(h.shell.fatal_conditions().is_empty());
        assert!(h.session.lock().try_get_context("town").unwrap().is_running());

        room.leave(close_codes::ABNORMAL);
        assert_eq!(
            h.shell.fatal_conditions(),
            vec![FatalCondition::ConnectionError { code: 1006 }]
        );
    }

    // -----------------------------------------------------------------------
    // Features
    // -----------------------------------------------------------------------

    struct Chat {
        log: Arc<Mutex<Vec<String>>>,
    }

    struct ChatObserver {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MessageObserver for ChatObserver {
        fn name(&self) -> &str {
            "chat"
        }

        fn on_message(&mut self, room: &dyn RoomHandle, message: &RoomMessage) -> Result<(), SyncError> {
            if message.act == "chat" {
                self.log.lock().push(room.name().to_string());
            }
            Ok(())
        }
    }

    impl Feature for Chat {
        fn attach_observers(&self, room: &mut RoomEvents) {
            room.attach_observer(Box::new(ChatObserver {
                log: self.log.clone(),
            }));
        }
    }

    #[test]
    fn features_attach_on_every_activation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = harness_with(|s| s.with_feature(Arc::new(Chat { log: log.clone() })));

        let (town, town_events) = join(&h, "town", None);
        let (forest, _forest_events) = join(&h, "forest", None);
        assert_eq!(town_events.lock().observer_count(), 1);

        town.push_message(RoomMessage::new("chat"));
        forest.push_message(RoomMessage::new("chat"));
        town.push_message(RoomMessage::new(acts::PLAYER_STATS));
        assert_eq!(*log.lock(), vec!["town".to_string(), "forest".to_string()]);
    }
}
