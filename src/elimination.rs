//! Elimination policy
//!
//! Decides how an eliminated player leaves play. The arena applies the plan:
//! membership first, then the host effect.

use crate::error::ArenaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an eliminated player is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EliminationMethod {
    /// Reduce vitality to zero
    Kill,
    /// Disconnect from the session
    #[default]
    Kick,
    /// Relocate to the lobby
    Teleport,
}

impl FromStr for EliminationMethod {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KILL" => Ok(EliminationMethod::Kill),
            "KICK" => Ok(EliminationMethod::Kick),
            "TELEPORT" => Ok(EliminationMethod::Teleport),
            other => Err(ArenaError::InvalidConfig(format!(
                "unknown elimination method: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for EliminationMethod {
    type Error = ArenaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EliminationMethod> for String {
    fn from(method: EliminationMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for EliminationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EliminationMethod::Kill => f.write_str("KILL"),
            EliminationMethod::Kick => f.write_str("KICK"),
            EliminationMethod::Teleport => f.write_str("TELEPORT"),
        }
    }
}

/// Host-side effect applied to the eliminated player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationEffect {
    Kill,
    Kick,
    TeleportToLobby,
}

/// What to do with one eliminated player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationPlan {
    pub effect: EliminationEffect,
    pub becomes_spectator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationPolicy {
    method: EliminationMethod,
    spectator_mode: bool,
}

impl EliminationPolicy {
    pub fn new(method: EliminationMethod, spectator_mode: bool) -> Self {
        Self {
            method,
            spectator_mode,
        }
    }

    pub fn method(&self) -> EliminationMethod {
        self.method
    }

    /// A kicked player has left the session, so it never spectates.
    pub fn plan(&self) -> EliminationPlan {
        match self.method {
            EliminationMethod::Kill => EliminationPlan {
                effect: EliminationEffect::Kill,
                becomes_spectator: self.spectator_mode,
            },
            EliminationMethod::Kick => EliminationPlan {
                effect: EliminationEffect::Kick,
                becomes_spectator: false,
            },
            EliminationMethod::Teleport => EliminationPlan {
                effect: EliminationEffect::TeleportToLobby,
                becomes_spectator: self.spectator_mode,
            },
        }
    }
}
