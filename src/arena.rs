//! Arena - one red light / green light game
//!
//! Each arena runs as a single task that owns all of its mutable state. The
//! [`Arena`] handle only sends commands to that task, so phase ticks,
//! movement checks and membership changes are applied one at a time in
//! arrival order.

use crate::config::GameConfig;
use crate::context::GameContext;
use crate::elimination::{EliminationEffect, EliminationPolicy};
use crate::error::{ArenaError, Result};
use crate::host::{EffectResult, PhaseEffect};
use crate::rewards::render_commands;
use crate::scheduler::{PhaseScheduler, Tick};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 100;

/// Why a game went back to `Waiting`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop_game` was called
    Manual,
    /// The last player was eliminated or finished
    NoPlayersLeft,
    /// The arena was deleted or the process is shutting down
    Shutdown,
}

/// Arena events emitted to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    /// Game started, light is green
    GameStart,
    /// Game stopped
    GameStop(StopReason),
    /// Light changed; `duration` seconds until the next change
    PhaseChange { light: LightState, duration: u32 },
    /// Player moved on red
    PlayerEliminated(PlayerId),
    /// Player reached the finish block
    PlayerFinished(PlayerId),
}

enum Command {
    Start(oneshot::Sender<bool>),
    Stop(oneshot::Sender<bool>),
    SetLight(LightState, oneshot::Sender<bool>),
    AddPlayer {
        id: PlayerId,
        name: String,
        reply: oneshot::Sender<bool>,
    },
    RemovePlayer {
        id: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Movement {
        id: PlayerId,
        from: Pose,
        to: Pose,
        reply: oneshot::Sender<MoveVerdict>,
    },
    Position {
        id: PlayerId,
        position: Position,
        reply: oneshot::Sender<FinishOutcome>,
    },
    Contains(PlayerId, oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<ArenaSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running arena. Cheap to clone.
#[derive(Clone)]
pub struct Arena {
    name: String,
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<ArenaEvent>,
}

impl Arena {
    /// Spawn the arena task. Must be called inside a tokio runtime.
    pub fn spawn(name: impl Into<String>, ctx: GameContext) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let core = ArenaCore::new(name.clone(), ctx, events.clone());
        tokio::spawn(run(core, rx));

        debug!("Spawned arena task: {}", name);
        Self { name, tx, events }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.events.subscribe()
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ArenaError::ArenaClosed(self.name.clone()))?;
        rx.await.map_err(|_| ArenaError::ArenaClosed(self.name.clone()))
    }

    // =========================================================================
    // Game Control
    // =========================================================================

    /// Start the game. Returns `false` if it was already running.
    pub async fn start_game(&self) -> Result<bool> {
        self.request(Command::Start).await
    }

    /// Stop the game. Returns `false` if it was already waiting.
    pub async fn stop_game(&self) -> Result<bool> {
        self.request(Command::Stop).await
    }

    /// Force the light to `light` and restart the countdown.
    /// Returns `false` if the game is not running or the light is already that color.
    pub async fn set_light(&self, light: LightState) -> Result<bool> {
        self.request(|reply| Command::SetLight(light, reply)).await
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a player to this arena only. Other arenas are not consulted; use
    /// [`ArenaRegistry::join`](crate::ArenaRegistry::join) to move a player between arenas.
    pub async fn add_player(&self, id: PlayerId, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        self.request(|reply| Command::AddPlayer { id, name, reply })
            .await
    }

    pub async fn remove_player(&self, id: PlayerId) -> Result<bool> {
        self.request(|reply| Command::RemovePlayer { id, reply })
            .await
    }

    pub async fn contains(&self, id: PlayerId) -> Result<bool> {
        self.request(|reply| Command::Contains(id, reply)).await
    }

    // =========================================================================
    // Host Events
    // =========================================================================

    /// Judge a movement. `Denied` means the host must cancel the move.
    pub async fn on_movement(&self, id: PlayerId, from: Pose, to: Pose) -> Result<MoveVerdict> {
        self.request(|reply| Command::Movement {
            id,
            from,
            to,
            reply,
        })
        .await
    }

    /// Check a new position against the finish block
    pub async fn on_position_update(&self, id: PlayerId, position: Position) -> Result<FinishOutcome> {
        self.request(|reply| Command::Position {
            id,
            position,
            reply,
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn snapshot(&self) -> Result<ArenaSnapshot> {
        self.request(Command::Snapshot).await
    }

    pub async fn state(&self) -> Result<GameState> {
        Ok(self.snapshot().await?.state)
    }

    pub async fn light_state(&self) -> Result<LightState> {
        Ok(self.snapshot().await?.light)
    }

    /// Stop the game if running and end the task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}

// =============================================================================
// Arena Task
// =============================================================================

async fn run(mut core: ArenaCore, mut rx: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else {
                    core.stop(StopReason::Shutdown);
                    break;
                };
                if !core.handle(cmd).await {
                    break;
                }
            }
            _ = core.scheduler.wait() => core.on_tick(),
        }
    }
    debug!("Arena task ended: {}", core.name);
}

struct ArenaCore {
    name: String,
    ctx: GameContext,
    /// Taken from the context at each start; fixed for the length of a game
    config: Arc<GameConfig>,
    policy: EliminationPolicy,
    scheduler: PhaseScheduler,
    events: broadcast::Sender<ArenaEvent>,
    state: GameState,
    light: LightState,
    players: HashMap<PlayerId, String>,
    spectators: HashMap<PlayerId, String>,
}

impl ArenaCore {
    fn new(name: String, ctx: GameContext, events: broadcast::Sender<ArenaEvent>) -> Self {
        Self {
            config: ctx.config(),
            policy: ctx.elimination_policy(),
            scheduler: ctx.scheduler(),
            name,
            ctx,
            events,
            state: GameState::Waiting,
            light: LightState::Green,
            players: HashMap::new(),
            spectators: HashMap::new(),
        }
    }

    /// Returns `false` once the task should end
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop(StopReason::Manual));
            }
            Command::SetLight(light, reply) => {
                let _ = reply.send(self.set_light(light));
            }
            Command::AddPlayer { id, name, reply } => {
                let _ = reply.send(self.add_player(id, name));
            }
            Command::RemovePlayer { id, reply } => {
                let _ = reply.send(self.remove_player(id));
            }
            Command::Movement { id, from, to, reply } => {
                let verdict = self.on_movement(id, &from, &to).await;
                let _ = reply.send(verdict);
            }
            Command::Position {
                id,
                position,
                reply,
            } => {
                let outcome = self.on_position(id, &position).await;
                let _ = reply.send(outcome);
            }
            Command::Contains(id, reply) => {
                let _ = reply.send(self.players.contains_key(&id));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(reply) => {
                self.stop(StopReason::Shutdown);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn emit(&self, event: ArenaEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn swallow(&self, what: &str, result: EffectResult) {
        if let Err(e) = result {
            warn!(arena = %self.name, "{} failed: {}", what, e);
        }
    }

    fn message(&self, key: &str, player: Option<&str>) -> String {
        let messages = &self.config.messages;
        match player {
            Some(player) => messages.render(key, &[("arena", &self.name), ("player", player)]),
            None => messages.render(key, &[("arena", &self.name)]),
        }
    }

    fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    fn member_ids(&self) -> Vec<PlayerId> {
        self.players
            .keys()
            .chain(self.spectators.keys())
            .copied()
            .collect()
    }

    /// Chat lines carry the configured prefix; titles and kick reasons do not
    fn chat(&self, message: &str) -> String {
        format!("{}{}", self.config.messages.template("prefix"), message)
    }

    fn broadcast(&self, message: &str) {
        let result = self
            .ctx
            .host
            .presenter
            .broadcast(&self.member_ids(), &self.chat(message));
        self.swallow("broadcast", result);
    }

    fn send(&self, what: &str, id: PlayerId, message: &str) {
        let result = self.ctx.host.presenter.send(id, &self.chat(message));
        self.swallow(what, result);
    }

    fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            name: self.name.clone(),
            state: self.state,
            light: self.light,
            time_remaining: self.scheduler.time_remaining(),
            players: self.player_ids(),
            spectators: self.spectators.keys().copied().collect(),
        }
    }

    // =========================================================================
    // State Machine
    // =========================================================================

    fn start(&mut self) -> bool {
        if self.state != GameState::Waiting {
            return false;
        }

        self.config = self.ctx.config();
        let elimination = &self.config.elimination;
        self.policy = EliminationPolicy::new(elimination.method, elimination.spectator_mode);
        self.scheduler.set_timers(self.config.timers.clone());

        self.state = GameState::Active;
        self.light = LightState::Green;
        self.broadcast(&self.message("game-start", None));

        let duration = self.scheduler.arm(self.light);
        self.show_phase();

        info!(arena = %self.name, players = self.players.len(), duration, "Game started");
        self.emit(ArenaEvent::GameStart);
        self.emit(ArenaEvent::PhaseChange {
            light: self.light,
            duration,
        });
        true
    }

    fn stop(&mut self, reason: StopReason) -> bool {
        if self.state == GameState::Waiting {
            return false;
        }

        self.scheduler.cancel();
        self.state = GameState::Waiting;
        self.spectators.clear();

        if self.config.effects.boss_bar.enabled {
            let result = self.ctx.host.presenter.clear_progress(&self.name);
            self.swallow("clear progress", result);
        }
        self.broadcast(&self.message("game-stopped", None));

        info!(arena = %self.name, ?reason, "Game stopped");
        self.emit(ArenaEvent::GameStop(reason));
        true
    }

    fn set_light(&mut self, light: LightState) -> bool {
        if self.state != GameState::Active || self.light == light {
            return false;
        }
        info!(arena = %self.name, %light, "Light set manually");
        self.switch_light(light);
        true
    }

    fn on_tick(&mut self) {
        // A disarmed scheduler never wakes, but stay safe against a stale tick
        if self.state != GameState::Active {
            return;
        }

        match self.scheduler.advance() {
            Tick::Counting(remaining) => {
                debug!(arena = %self.name, remaining, "Tick");
                self.update_progress();
            }
            Tick::Expired => self.switch_light(self.light.toggled()),
        }
    }

    fn switch_light(&mut self, light: LightState) {
        self.light = light;
        let duration = self.scheduler.arm(light);
        self.show_phase();

        info!(arena = %self.name, %light, duration, "Phase changed");
        self.emit(ArenaEvent::PhaseChange { light, duration });
    }

    fn show_phase(&self) {
        let effects = &self.config.effects;
        let (title_key, action_key) = match self.light {
            LightState::Green => ("green-light", "green-light-action"),
            LightState::Red => ("red-light", "red-light-action"),
        };

        let effect = PhaseEffect {
            arena: self.name.clone(),
            light: self.light,
            title: self.message(title_key, None),
            action_bar: effects
                .action_bar
                .enabled
                .then(|| self.message(action_key, None)),
            sound: effects.sounds.key_for(self.light).map(str::to_string),
        };

        let result = self
            .ctx
            .host
            .presenter
            .show_phase_effect(&self.player_ids(), &effect);
        self.swallow("phase effect", result);

        self.update_progress();
        self.broadcast(&effect.title);
    }

    fn update_progress(&self) {
        if !self.config.effects.boss_bar.enabled {
            return;
        }
        let result = self.ctx.host.presenter.update_progress(
            &self.name,
            &self.player_ids(),
            self.scheduler.fraction_remaining(),
        );
        self.swallow("progress update", result);
    }

    fn auto_stop(&mut self) {
        if self.players.is_empty() && self.state != GameState::Waiting {
            info!(arena = %self.name, "No players left, stopping");
            self.stop(StopReason::NoPlayersLeft);
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    fn add_player(&mut self, id: PlayerId, name: String) -> bool {
        self.spectators.remove(&id);
        let added = self.players.insert(id, name).is_none();
        if added {
            debug!(arena = %self.name, %id, "Player added");
        }
        added
    }

    fn remove_player(&mut self, id: PlayerId) -> bool {
        let was_player = self.players.remove(&id).is_some();
        let was_spectator = self.spectators.remove(&id).is_some();
        if was_player || was_spectator {
            debug!(arena = %self.name, %id, "Player removed");
        }
        was_player || was_spectator
    }

    // =========================================================================
    // Movement Monitor
    // =========================================================================

    async fn on_movement(&mut self, id: PlayerId, from: &Pose, to: &Pose) -> MoveVerdict {
        if !self.players.contains_key(&id) {
            return MoveVerdict::Allowed;
        }
        if self.state != GameState::Active || self.light != LightState::Red {
            return MoveVerdict::Allowed;
        }
        if self.ctx.store.is_immune(&id).await {
            return MoveVerdict::Allowed;
        }
        if !to.differs_from(from) {
            return MoveVerdict::Allowed;
        }

        self.eliminate(id).await;
        MoveVerdict::Denied
    }

    async fn eliminate(&mut self, id: PlayerId) {
        let Some(name) = self.players.remove(&id) else {
            return;
        };

        let plan = self.policy.plan();
        if plan.becomes_spectator {
            self.spectators.insert(id, name.clone());
        }
        info!(arena = %self.name, player = %name, method = %self.policy.method(), "Player eliminated");

        let message = self.message("eliminated", Some(&name));
        let effects = self.ctx.host.effects.clone();
        match plan.effect {
            EliminationEffect::Kill => self.swallow("kill", effects.kill(id)),
            EliminationEffect::Kick => self.swallow("kick", effects.kick(id, &message)),
            EliminationEffect::TeleportToLobby => match self.ctx.store.require_lobby().await {
                Ok(lobby) => self.swallow("teleport", effects.teleport(id, &lobby)),
                Err(e) => warn!(arena = %self.name, player = %name, "Cannot teleport: {}", e),
            },
        }

        if plan.becomes_spectator {
            self.swallow("spectator mode", effects.set_spectator(id));
            let notice = self.message("spectator-mode", Some(&name));
            self.send("spectator notice", id, &notice);
        }

        self.broadcast(&message);
        if plan.effect != EliminationEffect::Kick {
            self.swallow("lightning", effects.strike_lightning(id));
        }

        self.emit(ArenaEvent::PlayerEliminated(id));
        self.auto_stop();
    }

    // =========================================================================
    // Finish Detector
    // =========================================================================

    async fn on_position(&mut self, id: PlayerId, position: &Position) -> FinishOutcome {
        if !self.players.contains_key(&id) || !position.is_finite() {
            return FinishOutcome::NotFinished;
        }
        if self.ctx.store.is_winner(&id).await {
            return FinishOutcome::NotFinished;
        }
        let Some(finish) = self.ctx.store.finish().await else {
            return FinishOutcome::NotFinished;
        };
        if position.block() != finish {
            return FinishOutcome::NotFinished;
        }

        let Some(name) = self.players.remove(&id) else {
            return FinishOutcome::NotFinished;
        };
        self.ctx.store.add_winner(id).await;
        info!(arena = %self.name, player = %name, "Player reached the finish");

        let message = self.message("player-won", Some(&name));
        self.send("win notice", id, &message);
        self.broadcast(&message);

        for command in render_commands(&self.config.rewards.commands, &name, &self.name) {
            debug!(arena = %self.name, %command, "Dispatching reward");
            let result = self.ctx.host.dispatcher.dispatch(&command);
            self.swallow("reward dispatch", result);
        }

        self.emit(ArenaEvent::PlayerFinished(id));
        self.auto_stop();
        FinishOutcome::Finished
    }
}
