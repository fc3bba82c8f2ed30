//! Terminal stand-in for the host engine

use rlgl_arena::host::EffectResult;
use rlgl_arena::{
    CommandDispatcher, EffectError, PhaseEffect, PlayerEffects, PlayerId, Pose, Position, Presenter,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub const WORLD: &str = "world";

#[derive(Debug, Clone)]
pub struct ConsolePlayer {
    pub id: PlayerId,
    pub name: String,
    pub pose: Pose,
    pub online: bool,
}

/// Prints every effect and tracks where each console player stands
#[derive(Default)]
pub struct ConsoleHost {
    players: Mutex<HashMap<PlayerId, ConsolePlayer>>,
}

impl ConsoleHost {
    /// Find a player by name (case-insensitive) or create one at spawn
    pub fn register(&self, name: &str) -> ConsolePlayer {
        let Ok(mut players) = self.players.lock() else {
            return spawn_player(name);
        };
        if let Some(player) = players
            .values_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
        {
            player.online = true;
            return player.clone();
        }
        let player = spawn_player(name);
        players.insert(player.id, player.clone());
        player
    }

    pub fn lookup(&self, name: &str) -> Option<ConsolePlayer> {
        self.players
            .lock()
            .ok()?
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn set_pose(&self, id: PlayerId, pose: Pose) {
        if let Ok(mut players) = self.players.lock() {
            if let Some(player) = players.get_mut(&id) {
                player.pose = pose;
            }
        }
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.players
            .lock()
            .ok()
            .and_then(|p| p.get(&id).map(|p| p.name.clone()))
            .unwrap_or_else(|| id.to_string())
    }

    fn online(&self, id: PlayerId) -> EffectResult {
        let online = self
            .players
            .lock()
            .ok()
            .and_then(|p| p.get(&id).map(|p| p.online))
            .unwrap_or(false);
        if online {
            Ok(())
        } else {
            Err(EffectError::PlayerOffline)
        }
    }

    pub fn names(&self, ids: &[PlayerId]) -> String {
        ids.iter()
            .map(|id| self.name_of(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn spawn_player(name: &str) -> ConsolePlayer {
    ConsolePlayer {
        id: Uuid::new_v4(),
        name: name.to_string(),
        pose: Position::new(WORLD, 0.5, 64.0, 0.5).into(),
        online: true,
    }
}

impl Presenter for ConsoleHost {
    fn broadcast(&self, recipients: &[PlayerId], message: &str) -> EffectResult {
        if !recipients.is_empty() {
            println!("[chat → {}] {}", self.names(recipients), message);
        }
        Ok(())
    }

    fn send(&self, player: PlayerId, message: &str) -> EffectResult {
        self.online(player)?;
        println!("[chat → {}] {}", self.name_of(player), message);
        Ok(())
    }

    fn show_phase_effect(&self, _players: &[PlayerId], effect: &PhaseEffect) -> EffectResult {
        let mut line = format!("[{}] === {} ===", effect.arena, effect.title);
        if let Some(action) = &effect.action_bar {
            line.push_str(&format!("  ({action})"));
        }
        if let Some(sound) = &effect.sound {
            line.push_str(&format!("  ♪ {sound}"));
        }
        println!("{line}");
        Ok(())
    }

    fn update_progress(&self, arena: &str, _players: &[PlayerId], fraction: f64) -> EffectResult {
        const WIDTH: usize = 20;
        let filled = ((fraction.clamp(0.0, 1.0) * WIDTH as f64).round()) as usize;
        println!(
            "[{}] [{}{}]",
            arena,
            "#".repeat(filled),
            "-".repeat(WIDTH - filled)
        );
        Ok(())
    }

    fn clear_progress(&self, arena: &str) -> EffectResult {
        println!("[{arena}] progress bar hidden");
        Ok(())
    }
}

impl PlayerEffects for ConsoleHost {
    fn kill(&self, player: PlayerId) -> EffectResult {
        self.online(player)?;
        println!("* {} was struck down", self.name_of(player));
        Ok(())
    }

    fn kick(&self, player: PlayerId, message: &str) -> EffectResult {
        self.online(player)?;
        if let Ok(mut players) = self.players.lock() {
            if let Some(p) = players.get_mut(&player) {
                p.online = false;
            }
        }
        println!("* {} was kicked: {}", self.name_of(player), message);
        Ok(())
    }

    fn teleport(&self, player: PlayerId, to: &Position) -> EffectResult {
        self.online(player)?;
        self.set_pose(player, to.clone().into());
        println!(
            "* {} teleported to {} ({:.1}, {:.1}, {:.1})",
            self.name_of(player),
            to.world,
            to.x,
            to.y,
            to.z
        );
        Ok(())
    }

    fn set_spectator(&self, player: PlayerId) -> EffectResult {
        self.online(player)?;
        println!("* {} is now a spectator", self.name_of(player));
        Ok(())
    }

    fn strike_lightning(&self, player: PlayerId) -> EffectResult {
        println!("* lightning strikes where {} stood", self.name_of(player));
        Ok(())
    }
}

impl CommandDispatcher for ConsoleHost {
    fn dispatch(&self, command: &str) -> EffectResult {
        if command.trim().is_empty() {
            return Err(EffectError::Rejected("empty command".to_string()));
        }
        println!("[console] /{command}");
        Ok(())
    }
}
