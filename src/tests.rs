//! Scenario tests for rlgl-arena

#[cfg(test)]
mod tests {
    use crate::arena::{Arena, ArenaEvent, StopReason};
    use crate::config::GameConfig;
    use crate::context::GameContext;
    use crate::elimination::EliminationMethod;
    use crate::error::ArenaError;
    use crate::host::Host;
    use crate::host::recording::{Call, RecordingHost};
    use crate::registry::ArenaRegistry;
    use crate::store::{Lobby, WorldStore};
    use crate::types::*;
    use std::sync::Arc;
    use tokio::time::{Duration, sleep};
    use uuid::Uuid;

    fn pose(x: f64, y: f64, z: f64) -> Pose {
        Position::new("world", x, y, z).into()
    }

    fn context(config: GameConfig, host: &Arc<RecordingHost>) -> GameContext {
        GameContext::new(config, WorldStore::in_memory(), Host::from_shared(host.clone()))
            .with_rng_seed(42)
    }

    /// Arena with fixed two-second green and three-second red phases
    fn fixed_timers() -> GameConfig {
        GameConfig::default().green_light(2, 2).red_light(3, 3)
    }

    async fn red_arena(config: GameConfig, host: &Arc<RecordingHost>) -> (Arena, GameContext) {
        let ctx = context(config, host);
        let arena = Arena::spawn("Main", ctx.clone());
        arena.start_game().await.unwrap();
        assert!(arena.set_light(LightState::Red).await.unwrap());
        (arena, ctx)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<ArenaEvent>) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // =========================================================================
    // State machine
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_start_arms_green_phase() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("A", context(GameConfig::default(), &host));

        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.state, GameState::Waiting);
        assert_eq!(snapshot.time_remaining, None);

        assert!(arena.start_game().await.unwrap());
        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.state, GameState::Active);
        assert_eq!(snapshot.light, LightState::Green);
        let remaining = snapshot.time_remaining.unwrap();
        assert!((5..=15).contains(&remaining));

        let effects = host.count(|c| matches!(c, Call::PhaseEffect(e) if e.light == LightState::Green));
        assert_eq!(effects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redundant_transitions_are_noops() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("A", context(GameConfig::default(), &host));

        assert!(!arena.stop_game().await.unwrap());
        assert!(arena.start_game().await.unwrap());
        assert!(!arena.start_game().await.unwrap());
        assert!(arena.stop_game().await.unwrap());
        assert!(!arena.stop_game().await.unwrap());
        assert!(!arena.set_light(LightState::Red).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_toggles_once_per_expiry() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("A", context(fixed_timers(), &host));
        let mut events = arena.subscribe();
        arena.start_game().await.unwrap();

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(arena.light_state().await.unwrap(), LightState::Green);
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(1));

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(arena.light_state().await.unwrap(), LightState::Red);
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(3));

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(arena.light_state().await.unwrap(), LightState::Green);

        let changes: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                ArenaEvent::PhaseChange { light, duration } => Some((light, duration)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                (LightState::Green, 2),
                (LightState::Red, 3),
                (LightState::Green, 2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_toggle_after_stop() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("A", context(fixed_timers(), &host));
        arena.start_game().await.unwrap();
        sleep(Duration::from_millis(500)).await;
        arena.stop_game().await.unwrap();

        let mut events = arena.subscribe();
        sleep(Duration::from_secs(60)).await;

        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.state, GameState::Waiting);
        assert_eq!(snapshot.light, LightState::Green);
        assert_eq!(snapshot.time_remaining, None);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_start_cycle_keeps_players_and_clears_spectators() {
        let host = RecordingHost::new();
        let config = GameConfig::default().elimination_method(EliminationMethod::Kill);
        let (arena, _ctx) = red_arena(config, &host).await;
        let stayer = Uuid::new_v4();
        let mover = Uuid::new_v4();
        arena.add_player(stayer, "Stay").await.unwrap();
        arena.add_player(mover, "Move").await.unwrap();

        let verdict = arena
            .on_movement(mover, pose(0.0, 64.0, 0.0), pose(1.0, 64.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Denied);
        assert!(arena.snapshot().await.unwrap().has_spectator(&mover));

        arena.stop_game().await.unwrap();
        arena.start_game().await.unwrap();

        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.light, LightState::Green);
        assert!(snapshot.time_remaining.is_some());
        assert!(snapshot.has_player(&stayer));
        assert!(snapshot.spectators.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reloaded_timers_apply_from_next_start() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(fixed_timers(), &host));
        let arena = registry.get_or_create("Main").await;
        assert!(registry.start_game("Main").await.unwrap());
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(2));

        let slower = GameConfig::default().green_light(7, 7).red_light(3, 3);
        registry.reload(slower).await.unwrap();

        // The running game keeps its two-second green
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(arena.light_state().await.unwrap(), LightState::Red);
        sleep(Duration::from_millis(3000)).await;
        assert_eq!(arena.light_state().await.unwrap(), LightState::Green);
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(2));

        arena.stop_game().await.unwrap();
        let mut events = arena.subscribe();
        assert!(registry.start_game("main").await.unwrap());
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(7));
        assert!(drain(&mut events).contains(&ArenaEvent::PhaseChange {
            light: LightState::Green,
            duration: 7,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_rejects_invalid_config() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(fixed_timers(), &host));

        let broken = GameConfig::default().green_light(9, 4);
        assert!(matches!(
            registry.reload(broken).await,
            Err(ArenaError::InvalidConfig(_))
        ));
        assert!(registry.start_game("Main").await.unwrap());
        let arena = registry.get_arena("Main").await.unwrap();
        assert_eq!(arena.snapshot().await.unwrap().time_remaining, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticking_continues_with_no_players() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("Empty", context(fixed_timers(), &host));
        arena.start_game().await.unwrap();
        sleep(Duration::from_millis(2500)).await;

        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.state, GameState::Active);
        assert_eq!(snapshot.light, LightState::Red);
    }

    // =========================================================================
    // Movement monitor
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_moving_on_red_eliminates_into_spectators() {
        let host = RecordingHost::new();
        let config = GameConfig::default().elimination_method(EliminationMethod::Kill);
        let (arena, _ctx) = red_arena(config, &host).await;
        let p = Uuid::new_v4();
        let other = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(other, "Other").await.unwrap();

        let verdict = arena
            .on_movement(p, pose(0.0, 64.0, 0.0), pose(0.0, 64.0, 1.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Denied);

        let snapshot = arena.snapshot().await.unwrap();
        assert!(!snapshot.has_player(&p));
        assert!(snapshot.has_spectator(&p));
        assert_eq!(snapshot.state, GameState::Active);

        let calls = host.calls();
        assert!(calls.contains(&Call::Kill(p)));
        assert!(calls.contains(&Call::Spectator(p)));
        assert!(calls.contains(&Call::Lightning(p)));
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::Broadcast(to, msg) if msg.contains("P moved on red light") && to.contains(&p) && to.contains(&other)
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orientation_change_counts_as_movement() {
        let host = RecordingHost::new();
        let (arena, _ctx) = red_arena(GameConfig::default(), &host).await;
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(Uuid::new_v4(), "Other").await.unwrap();

        let from = pose(0.0, 64.0, 0.0);
        let mut to = from.clone();
        to.yaw = 90.0;
        let verdict = arena.on_movement(p, from, to).await.unwrap();
        assert_eq!(verdict, MoveVerdict::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_change_or_green_light_is_allowed() {
        let host = RecordingHost::new();
        let ctx = context(GameConfig::default(), &host);
        let arena = Arena::spawn("A", ctx);
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();

        // Waiting: any move is fine
        let verdict = arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(5.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Allowed);

        arena.start_game().await.unwrap();
        let verdict = arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(5.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Allowed);

        arena.set_light(LightState::Red).await.unwrap();
        let verdict = arena
            .on_movement(p, pose(5.0, 0.0, 0.0), pose(5.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Allowed);
        assert!(arena.snapshot().await.unwrap().has_player(&p));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_member_is_ignored() {
        let host = RecordingHost::new();
        let (arena, _ctx) = red_arena(GameConfig::default(), &host).await;
        let stranger = Uuid::new_v4();

        let verdict = arena
            .on_movement(stranger, pose(0.0, 0.0, 0.0), pose(3.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Allowed);
        assert_eq!(host.count(|c| matches!(c, Call::Kick(..))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_and_guest_are_never_eliminated() {
        let host = RecordingHost::new();
        let (arena, ctx) = red_arena(GameConfig::default(), &host).await;
        let admin = Uuid::new_v4();
        let guest = Uuid::new_v4();
        ctx.store.add_admin(admin).await;
        ctx.store.add_guest(guest).await;
        arena.add_player(admin, "Q").await.unwrap();
        arena.add_player(guest, "G").await.unwrap();

        for step in 0..20_i32 {
            let x = f64::from(step);
            for id in [admin, guest] {
                let verdict = arena
                    .on_movement(id, pose(x, 64.0, 0.0), pose(x + 1.0, 64.0, 0.0))
                    .await
                    .unwrap();
                assert_eq!(verdict, MoveVerdict::Allowed);
            }
        }

        let snapshot = arena.snapshot().await.unwrap();
        assert!(snapshot.has_player(&admin));
        assert!(snapshot.has_player(&guest));
        assert!(snapshot.spectators.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_never_spectates() {
        for spectator_mode in [true, false] {
            let host = RecordingHost::new();
            let config = GameConfig::default()
                .elimination_method(EliminationMethod::Kick)
                .spectator_mode(spectator_mode);
            let (arena, _ctx) = red_arena(config, &host).await;
            let p = Uuid::new_v4();
            arena.add_player(p, "P").await.unwrap();
            arena.add_player(Uuid::new_v4(), "Other").await.unwrap();

            arena
                .on_movement(p, pose(0.0, 0.0, 0.0), pose(0.0, 1.0, 0.0))
                .await
                .unwrap();

            let snapshot = arena.snapshot().await.unwrap();
            assert!(!snapshot.has_player(&p));
            assert!(!snapshot.has_spectator(&p));
            assert!(host.calls().iter().any(|c| matches!(c, Call::Kick(id, _) if *id == p)));
            assert_eq!(host.count(|c| matches!(c, Call::Spectator(_))), 0);
            assert_eq!(host.count(|c| matches!(c, Call::Lightning(_))), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teleport_to_lobby() {
        let host = RecordingHost::new();
        let config = GameConfig::default()
            .elimination_method(EliminationMethod::Teleport)
            .spectator_mode(false);
        let (arena, ctx) = red_arena(config, &host).await;
        let lobby = Position::new("world", 0.5, 70.0, 0.5);
        ctx.store.set_lobby(lobby.clone()).await;
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(Uuid::new_v4(), "Other").await.unwrap();

        arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(1.0, 0.0, 0.0))
            .await
            .unwrap();

        assert!(host.calls().contains(&Call::Teleport(p, lobby)));
        let snapshot = arena.snapshot().await.unwrap();
        assert!(!snapshot.has_player(&p));
        assert!(!snapshot.has_spectator(&p));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teleport_without_lobby_still_eliminates() {
        let host = RecordingHost::new();
        let config = GameConfig::default().elimination_method(EliminationMethod::Teleport);
        let (arena, _ctx) = red_arena(config, &host).await;
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(Uuid::new_v4(), "Other").await.unwrap();

        let verdict = arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(1.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Denied);
        assert_eq!(host.count(|c| matches!(c, Call::Teleport(..))), 0);
        assert!(arena.snapshot().await.unwrap().has_spectator(&p));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_elimination_auto_stops() {
        let host = RecordingHost::new();
        let (arena, _ctx) = red_arena(GameConfig::default(), &host).await;
        let mut events = arena.subscribe();
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();

        arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(1.0, 0.0, 0.0))
            .await
            .unwrap();

        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.state, GameState::Waiting);
        assert!(snapshot.players.is_empty());
        assert!(snapshot.spectators.is_empty());
        assert_eq!(
            drain(&mut events),
            vec![
                ArenaEvent::PlayerEliminated(p),
                ArenaEvent::GameStop(StopReason::NoPlayersLeft)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_effect_failures_do_not_abort_elimination() {
        let host = RecordingHost::failing();
        let config = GameConfig::default().elimination_method(EliminationMethod::Kill);
        let (arena, _ctx) = red_arena(config, &host).await;
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(Uuid::new_v4(), "Other").await.unwrap();

        let verdict = arena
            .on_movement(p, pose(0.0, 0.0, 0.0), pose(1.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(verdict, MoveVerdict::Denied);
        assert!(arena.snapshot().await.unwrap().has_spectator(&p));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_moves_eliminate_each_player_once() {
        let host = RecordingHost::new();
        let (arena, ctx) = red_arena(GameConfig::default(), &host).await;
        let admin = Uuid::new_v4();
        ctx.store.add_admin(admin).await;
        arena.add_player(admin, "Admin").await.unwrap();

        let players: Vec<PlayerId> = (0..16).map(|_| Uuid::new_v4()).collect();
        for (i, id) in players.iter().enumerate() {
            arena.add_player(*id, format!("P{i}")).await.unwrap();
        }

        let mut handles = Vec::new();
        for id in players.iter().copied() {
            for step in 0..4_i32 {
                let arena = arena.clone();
                handles.push(tokio::spawn(async move {
                    let x = f64::from(step);
                    arena
                        .on_movement(id, pose(x, 0.0, 0.0), pose(x + 0.5, 0.0, 0.0))
                        .await
                        .unwrap()
                }));
            }
        }

        let mut denied = 0;
        for handle in handles {
            if handle.await.unwrap() == MoveVerdict::Denied {
                denied += 1;
            }
        }

        assert_eq!(denied, players.len());
        assert_eq!(host.count(|c| matches!(c, Call::Spectator(_))), 0);
        assert_eq!(host.count(|c| matches!(c, Call::Kick(..))), players.len());
        let snapshot = arena.snapshot().await.unwrap();
        assert_eq!(snapshot.players, vec![admin]);
        assert_eq!(snapshot.state, GameState::Active);
    }

    // =========================================================================
    // Finish detector
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_reaching_finish_wins_and_auto_stops() {
        let host = RecordingHost::new();
        let config = GameConfig::default().reward_commands(vec![
            "give {player} diamond 1".to_string(),
            "say {player} won {arena}".to_string(),
        ]);
        let ctx = context(config, &host);
        ctx.store.set_finish(BlockPos::new("w", 10, 64, -3)).await;
        let arena = Arena::spawn("Main", ctx.clone());
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.start_game().await.unwrap();

        let miss = arena
            .on_position_update(p, Position::new("w", 11.2, 64.0, -2.5))
            .await
            .unwrap();
        assert_eq!(miss, FinishOutcome::NotFinished);

        let wrong_world = arena
            .on_position_update(p, Position::new("nether", 10.5, 64.0, -2.5))
            .await
            .unwrap();
        assert_eq!(wrong_world, FinishOutcome::NotFinished);

        let hit = arena
            .on_position_update(p, Position::new("w", 10.9, 64.3, -2.1))
            .await
            .unwrap();
        assert_eq!(hit, FinishOutcome::Finished);

        assert!(ctx.store.is_winner(&p).await);
        let snapshot = arena.snapshot().await.unwrap();
        assert!(!snapshot.has_player(&p));
        assert_eq!(snapshot.state, GameState::Waiting);
        assert!(host.calls().contains(&Call::Send(
            p,
            "[RLGL] P reached the finish in Main!".to_string()
        )));

        let dispatched: Vec<String> = host
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Dispatch(cmd) => Some(cmd),
                _ => None,
            })
            .collect();
        assert_eq!(dispatched, vec!["give P diamond 1", "say P won Main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_ignored_without_finish_block() {
        let host = RecordingHost::new();
        let ctx = context(GameConfig::default(), &host);
        let arena = Arena::spawn("Main", ctx);
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();

        let outcome = arena
            .on_position_update(p, Position::new("w", 10.0, 64.0, -3.0))
            .await
            .unwrap();
        assert_eq!(outcome, FinishOutcome::NotFinished);
        assert!(arena.contains(p).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_position_never_finishes() {
        let host = RecordingHost::new();
        let ctx = context(GameConfig::default(), &host);
        ctx.store.set_finish(BlockPos::new("w", 0, 0, 0)).await;
        let arena = Arena::spawn("Main", ctx.clone());
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();

        for position in [
            Position::new("w", f64::NAN, f64::NAN, f64::NAN),
            Position::new("w", f64::NAN, 0.0, 0.0),
            Position::new("w", 0.0, f64::INFINITY, 0.0),
        ] {
            let outcome = arena.on_position_update(p, position).await.unwrap();
            assert_eq!(outcome, FinishOutcome::NotFinished);
        }
        assert!(arena.contains(p).await.unwrap());
        assert!(!ctx.store.is_winner(&p).await);
        assert_eq!(host.count(|c| matches!(c, Call::Dispatch(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_stays_immune() {
        let host = RecordingHost::new();
        let ctx = context(GameConfig::default(), &host);
        ctx.store.set_finish(BlockPos::new("w", 0, 0, 0)).await;
        let arena = Arena::spawn("Main", ctx.clone());
        let p = Uuid::new_v4();
        arena.add_player(p, "P").await.unwrap();
        arena.add_player(Uuid::new_v4(), "Other").await.unwrap();
        arena.start_game().await.unwrap();

        arena
            .on_position_update(p, Position::new("w", 0.5, 0.5, 0.5))
            .await
            .unwrap();

        // Rejoins and moves on red: still immune
        arena.add_player(p, "P").await.unwrap();
        arena.set_light(LightState::Red).await.unwrap();
        for _ in 0..5 {
            let verdict = arena
                .on_movement(p, pose(0.0, 0.0, 0.0), pose(4.0, 0.0, 0.0))
                .await
                .unwrap();
            assert_eq!(verdict, MoveVerdict::Allowed);
        }

        // A second finish does not win again
        let outcome = arena
            .on_position_update(p, Position::new("w", 0.5, 0.5, 0.5))
            .await
            .unwrap();
        assert_eq!(outcome, FinishOutcome::NotFinished);
        assert!(ctx.store.is_winner(&p).await);
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_progress_indicator_follows_config() {
        let host = RecordingHost::new();
        let arena = Arena::spawn("A", context(fixed_timers(), &host));
        arena.start_game().await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        arena.snapshot().await.unwrap();

        let progress: Vec<f64> = host
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Progress(_, f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1.0, 0.5]);

        let quiet = RecordingHost::new();
        let arena = Arena::spawn("B", context(fixed_timers().boss_bar(false), &quiet));
        arena.start_game().await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        arena.stop_game().await.unwrap();
        assert_eq!(
            quiet.count(|c| matches!(c, Call::Progress(..) | Call::ClearProgress(_))),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_effect_carries_sound_and_action_bar() {
        let host = RecordingHost::new();
        let (_arena, _ctx) = red_arena(GameConfig::default(), &host).await;

        let red = host
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::PhaseEffect(e) if e.light == LightState::Red => Some(e),
                _ => None,
            })
            .unwrap();
        assert_eq!(red.arena, "Main");
        assert_eq!(red.title, "RED LIGHT");
        assert_eq!(red.action_bar.as_deref(), Some("Don't move!"));
        assert_eq!(red.sound.as_deref(), Some("BLOCK_NOTE_BLOCK_BASS"));
    }

    // =========================================================================
    // Registry
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_registry_names_are_case_insensitive() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));

        registry.create_arena("Main").await.unwrap();
        assert!(matches!(
            registry.create_arena("MAIN").await,
            Err(ArenaError::ArenaExists(_))
        ));
        assert_eq!(registry.get_arena("main").await.unwrap().name(), "Main");
        assert!(matches!(
            registry.get_arena("other").await,
            Err(ArenaError::ArenaNotFound(_))
        ));

        registry.get_or_create("beta").await;
        registry.get_or_create("Beta").await;
        let names: Vec<String> = registry
            .list_arenas()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["beta", "Main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_arena_stops_and_closes() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        let arena = registry.create_arena("Main").await.unwrap();
        let mut events = arena.subscribe();
        arena.start_game().await.unwrap();

        registry.delete_arena("main").await.unwrap();
        assert!(matches!(
            arena.snapshot().await,
            Err(ArenaError::ArenaClosed(_))
        ));
        assert!(drain(&mut events).contains(&ArenaEvent::GameStop(StopReason::Shutdown)));
        assert!(matches!(
            registry.delete_arena("main").await,
            Err(ArenaError::ArenaNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_movement_finds_owning_arena() {
        let host = RecordingHost::new();
        let ctx = context(GameConfig::default(), &host);
        ctx.store.set_finish(BlockPos::new("world", 5, 64, 0)).await;
        let registry = ArenaRegistry::new(ctx);

        let calm = registry.create_arena("calm").await.unwrap();
        let tense = registry.create_arena("tense").await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        calm.add_player(a, "A").await.unwrap();
        tense.add_player(b, "B").await.unwrap();
        tense.add_player(c, "C").await.unwrap();
        calm.start_game().await.unwrap();
        tense.start_game().await.unwrap();
        tense.set_light(LightState::Red).await.unwrap();

        let moved = |x: f64| (pose(x, 64.0, 0.0), pose(x + 1.0, 64.0, 0.0));

        let (from, to) = moved(0.0);
        assert_eq!(registry.route_movement(a, from, to).await.unwrap(), MoveVerdict::Allowed);

        // Stepping onto the finish on red wins rather than eliminates
        let (from, to) = moved(4.0);
        assert_eq!(registry.route_movement(b, from, to).await.unwrap(), MoveVerdict::Allowed);
        assert!(registry.context().store.is_winner(&b).await);

        let (from, to) = moved(0.0);
        assert_eq!(registry.route_movement(c, from, to).await.unwrap(), MoveVerdict::Denied);

        let (from, to) = moved(0.0);
        let outsider = Uuid::new_v4();
        assert_eq!(
            registry.route_movement(outsider, from, to).await.unwrap(),
            MoveVerdict::Allowed
        );
        assert!(registry.arena_of(a).await.is_some());
        assert!(registry.arena_of(outsider).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_keeps_arenas() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        registry.create_arena("one").await.unwrap().start_game().await.unwrap();
        registry.create_arena("two").await.unwrap();

        assert_eq!(registry.stop_all().await, 1);
        assert_eq!(registry.stop_all().await, 0);
        let snapshots = registry.list_arenas().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.state == GameState::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_shutdown_stops_everything() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        let arena = registry.get_or_create("default").await;
        arena.start_game().await.unwrap();

        registry.shutdown().await.unwrap();
        assert!(registry.list_arenas().await.is_empty());
        assert!(arena.state().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_game_creates_unknown_arena() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));

        assert!(registry.start_game("Fresh").await.unwrap());
        let arena = registry.get_arena("fresh").await.unwrap();
        assert_eq!(arena.name(), "Fresh");
        assert_eq!(arena.state().await.unwrap(), GameState::Active);
        assert!(!registry.start_game("FRESH").await.unwrap());
        assert_eq!(registry.list_arenas().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_moves_player_between_arenas() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        let first = registry.create_arena("first").await.unwrap();
        let second = registry.create_arena("second").await.unwrap();
        let p = Uuid::new_v4();

        registry.join("first", p, "P").await.unwrap();
        assert_eq!(registry.arena_of(p).await.unwrap().name(), "first");

        let joined = registry.join("Second", p, "P").await.unwrap();
        assert_eq!(joined.name(), "second");
        assert!(!first.contains(p).await.unwrap());
        assert!(second.contains(p).await.unwrap());
        assert_eq!(registry.arena_of(p).await.unwrap().name(), "second");

        assert!(matches!(
            registry.join("missing", p, "P").await,
            Err(ArenaError::ArenaNotFound(_))
        ));
        assert!(second.contains(p).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teleport_to_lobbies() {
        let host = RecordingHost::new();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        let store = &registry.context().store;
        let guest = Uuid::new_v4();
        let admin = Uuid::new_v4();
        store.add_guest(guest).await;
        store.add_admin(admin).await;

        assert!(matches!(
            registry.teleport(&store.guests().await, Lobby::Guest).await,
            Err(ArenaError::LocationNotSet(_))
        ));
        assert!(matches!(
            registry.teleport(&[admin], Lobby::Game).await,
            Err(ArenaError::LocationNotSet(_))
        ));
        assert_eq!(host.count(|c| matches!(c, Call::Teleport(..))), 0);

        let guest_lobby = Position::new("world", 3.0, 70.0, 3.0);
        store.set_guest_lobby(guest_lobby.clone()).await;
        let moved = registry
            .teleport(&store.guests().await, Lobby::Guest)
            .await
            .unwrap();
        assert_eq!(moved, 1);
        assert!(host.calls().contains(&Call::Teleport(guest, guest_lobby)));

        let lobby = Position::new("world", 0.0, 64.0, 0.0);
        store.set_lobby(lobby.clone()).await;
        assert_eq!(registry.teleport(&[admin], Lobby::Game).await.unwrap(), 1);
        assert!(host.calls().contains(&Call::Teleport(admin, lobby)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teleport_counts_only_accepted() {
        let host = RecordingHost::failing();
        let registry = ArenaRegistry::new(context(GameConfig::default(), &host));
        let store = &registry.context().store;
        store.set_lobby(Position::new("world", 0.0, 64.0, 0.0)).await;

        let players = [Uuid::new_v4(), Uuid::new_v4()];
        assert_eq!(registry.teleport(&players, Lobby::Game).await.unwrap(), 0);
        assert_eq!(host.count(|c| matches!(c, Call::Teleport(..))), 2);
    }
}
