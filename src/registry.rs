//! Arena registry - name lookup and lifecycle

use crate::arena::Arena;
use crate::config::GameConfig;
use crate::context::GameContext;
use crate::error::{ArenaError, Result};
use crate::store::Lobby;
use crate::types::*;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Arena name used when a command names none
pub const DEFAULT_ARENA: &str = "default";

/// Case-insensitive map of arena name to running arena
pub struct ArenaRegistry {
    ctx: GameContext,
    arenas: RwLock<HashMap<String, Arena>>,
}

impl ArenaRegistry {
    pub fn new(ctx: GameContext) -> Self {
        Self {
            ctx,
            arenas: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    /// Create a new arena; fails if the name is taken
    pub async fn create_arena(&self, name: &str) -> Result<Arena> {
        let mut arenas = self.arenas.write().await;
        let key = arena_key(name);
        if arenas.contains_key(&key) {
            return Err(ArenaError::ArenaExists(name.to_string()));
        }

        let arena = Arena::spawn(name, self.ctx.clone());
        arenas.insert(key, arena.clone());
        info!("Created arena: {}", name);
        Ok(arena)
    }

    pub async fn get_arena(&self, name: &str) -> Result<Arena> {
        self.arenas
            .read()
            .await
            .get(&arena_key(name))
            .cloned()
            .ok_or_else(|| ArenaError::ArenaNotFound(name.to_string()))
    }

    /// Look up an arena, creating it on first use
    pub async fn get_or_create(&self, name: &str) -> Arena {
        let mut arenas = self.arenas.write().await;
        arenas
            .entry(arena_key(name))
            .or_insert_with(|| {
                info!("Created arena: {}", name);
                Arena::spawn(name, self.ctx.clone())
            })
            .clone()
    }

    /// Start the named arena's game, creating the arena if needed.
    /// Returns `false` if it was already running.
    pub async fn start_game(&self, name: &str) -> Result<bool> {
        self.get_or_create(name).await.start_game().await
    }

    /// Snapshots of every arena, sorted by name
    pub async fn list_arenas(&self) -> Vec<ArenaSnapshot> {
        let arenas: Vec<Arena> = self.arenas.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(arenas.len());
        for arena in arenas {
            match arena.snapshot().await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("Skipping arena {}: {}", arena.name(), e),
            }
        }
        snapshots.sort_by_key(|s| arena_key(&s.name));
        snapshots
    }

    /// Stop the arena's game and remove it
    pub async fn delete_arena(&self, name: &str) -> Result<()> {
        let arena = self
            .arenas
            .write()
            .await
            .remove(&arena_key(name))
            .ok_or_else(|| ArenaError::ArenaNotFound(name.to_string()))?;

        arena.shutdown().await?;
        info!("Deleted arena: {}", arena.name());
        Ok(())
    }

    /// Put a player in the named arena, taking them out of any other first.
    /// Joining through here keeps every player in at most one arena.
    pub async fn join(&self, name: &str, id: PlayerId, player: impl Into<String>) -> Result<Arena> {
        let target = self.get_arena(name).await?;
        let target_key = arena_key(target.name());

        let arenas: Vec<Arena> = self.arenas.read().await.values().cloned().collect();
        for arena in arenas {
            if arena_key(arena.name()) != target_key && arena.remove_player(id).await? {
                debug!(%id, "Left {} to join {}", arena.name(), target.name());
            }
        }

        target.add_player(id, player).await?;
        Ok(target)
    }

    /// Arena whose active player set contains `id`.
    /// Assumes players joined through [`ArenaRegistry::join`]; if a player was
    /// added to several arenas directly, any one of them may be returned.
    pub async fn arena_of(&self, id: PlayerId) -> Option<Arena> {
        let arenas: Vec<Arena> = self.arenas.read().await.values().cloned().collect();
        for arena in arenas {
            if arena.contains(id).await.unwrap_or(false) {
                return Some(arena);
            }
        }
        None
    }

    /// Deliver one host movement event: finish check first, then the red light check.
    /// Players outside every arena are always allowed to move.
    pub async fn route_movement(&self, id: PlayerId, from: Pose, to: Pose) -> Result<MoveVerdict> {
        let Some(arena) = self.arena_of(id).await else {
            return Ok(MoveVerdict::Allowed);
        };

        if arena.on_position_update(id, to.position.clone()).await? == FinishOutcome::Finished {
            return Ok(MoveVerdict::Allowed);
        }
        arena.on_movement(id, from, to).await
    }

    /// Teleport `players` to a lobby through the host.
    /// Returns how many teleports the host accepted.
    pub async fn teleport(&self, players: &[PlayerId], lobby: Lobby) -> Result<usize> {
        let destination = self.ctx.store.require(lobby).await?;

        let mut moved = 0;
        for id in players {
            match self.ctx.host.effects.teleport(*id, &destination) {
                Ok(()) => moved += 1,
                Err(e) => debug!(%id, "Teleport to {} skipped: {}", lobby.label(), e),
            }
        }
        info!("Teleported {} player(s) to the {}", moved, lobby.label());
        Ok(moved)
    }

    /// Validate and apply a new configuration, then re-read the world data file.
    /// Games already running keep their settings until they are restarted.
    pub async fn reload(&self, config: GameConfig) -> Result<()> {
        config.validate()?;
        self.ctx.store.reload().await?;
        self.ctx.replace_config(config);
        info!("Configuration reloaded");
        Ok(())
    }

    /// Stop every running game; arenas stay registered. Returns how many stopped.
    pub async fn stop_all(&self) -> usize {
        let arenas: Vec<Arena> = self.arenas.read().await.values().cloned().collect();
        let mut stopped = 0;
        for arena in arenas {
            match arena.stop_game().await {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to stop arena {}: {}", arena.name(), e),
            }
        }
        if stopped > 0 {
            info!("Stopped {} running game(s)", stopped);
        }
        stopped
    }

    /// Stop every game, end every arena task and flush the store
    pub async fn shutdown(&self) -> Result<()> {
        let arenas: Vec<Arena> = self.arenas.write().await.drain().map(|(_, a)| a).collect();
        for arena in arenas {
            if let Err(e) = arena.shutdown().await {
                warn!("Failed to shut down arena {}: {}", arena.name(), e);
            }
        }
        self.ctx.store.save().await
    }
}
