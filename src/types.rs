//! Type definitions for rlgl-arena

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Player identity as delivered by the host engine
pub type PlayerId = Uuid;

/// Arena game status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameState {
    /// No timer running
    #[default]
    Waiting,
    /// Exactly one live phase timer
    Active,
    /// Reserved; a finished arena collapses back to `Waiting`
    Finished,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Waiting => f.write_str("WAITING"),
            GameState::Active => f.write_str("ACTIVE"),
            GameState::Finished => f.write_str("FINISHED"),
        }
    }
}

/// Current light color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightState {
    /// Movement allowed
    #[default]
    Green,
    /// Movement forbidden
    Red,
}

impl LightState {
    pub fn toggled(self) -> Self {
        match self {
            LightState::Green => LightState::Red,
            LightState::Red => LightState::Green,
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightState::Green => f.write_str("GREEN"),
            LightState::Red => f.write_str("RED"),
        }
    }
}

/// A point in a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// False if any coordinate is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Block containing this position (components floored)
    pub fn block(&self) -> BlockPos {
        BlockPos {
            world: self.world.clone(),
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            z: self.z.floor() as i64,
        }
    }
}

/// Position plus orientation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Pose {
    pub fn new(position: Position, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Any change of position or orientation counts, including a world change.
    pub fn differs_from(&self, other: &Pose) -> bool {
        self.position != other.position || self.yaw != other.yaw || self.pitch != other.pitch
    }
}

impl From<Position> for Pose {
    fn from(position: Position) -> Self {
        Self::new(position, 0.0, 0.0)
    }
}

/// Integer block coordinate in a named world
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub fn new(world: impl Into<String>, x: i64, y: i64, z: i64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Result of judging a movement event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveVerdict {
    /// Let the movement through
    Allowed,
    /// Cancel the movement at the source; the player has been eliminated
    Denied,
}

/// Result of judging a position update against the finish block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    NotFinished,
    Finished,
}

/// Point-in-time view of one arena
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArenaSnapshot {
    pub name: String,
    pub state: GameState,
    pub light: LightState,
    pub time_remaining: Option<u32>,
    pub players: Vec<PlayerId>,
    pub spectators: Vec<PlayerId>,
}

impl ArenaSnapshot {
    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.contains(id)
    }

    pub fn has_spectator(&self, id: &PlayerId) -> bool {
        self.spectators.contains(id)
    }
}

/// Normalized registry key for an arena name
pub fn arena_key(name: &str) -> String {
    name.to_lowercase()
}
