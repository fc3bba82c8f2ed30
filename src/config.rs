//! Game configuration
//!
//! Loaded once from YAML and shared read-only by every arena. All keys are
//! optional; a missing key takes the default shown on the field.
//!
//! ```yaml
//! timers:
//!   green-light: { min: 5, max: 15 }
//!   red-light: { min: 3, max: 8 }
//! elimination:
//!   method: KICK
//!   spectator-mode: true
//! rewards:
//!   commands:
//!     - "give {player} diamond 1"
//! ```

use crate::elimination::EliminationMethod;
use crate::error::{ArenaError, Result};
use crate::types::LightState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Inclusive range of phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBounds {
    pub min: u32,
    pub max: u32,
}

impl PhaseBounds {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Draw a duration uniformly from `[min, max]`.
    ///
    /// `min <= max` is checked by [`GameConfig::validate`]; a reversed pair
    /// collapses to `min` here rather than panicking.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let span = self.max.saturating_sub(self.min);
        self.min + rng.gen_range(0..=span)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimerConfig {
    /// default: 5..=15
    pub green_light: PhaseBounds,
    /// default: 3..=8
    pub red_light: PhaseBounds,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            green_light: PhaseBounds::new(5, 15),
            red_light: PhaseBounds::new(3, 8),
        }
    }
}

impl TimerConfig {
    pub fn bounds_for(&self, light: LightState) -> PhaseBounds {
        match light {
            LightState::Green => self.green_light,
            LightState::Red => self.red_light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EliminationConfig {
    /// default: KICK
    pub method: EliminationMethod,
    /// default: true
    pub spectator_mode: bool,
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            method: EliminationMethod::Kick,
            spectator_mode: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RewardConfig {
    /// Command templates run for each winner, in order.
    /// `{player}` and `{arena}` are substituted.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SoundConfig {
    pub enabled: bool,
    pub green_light: String,
    pub red_light: String,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            green_light: "BLOCK_NOTE_BLOCK_PLING".to_string(),
            red_light: "BLOCK_NOTE_BLOCK_BASS".to_string(),
        }
    }
}

impl SoundConfig {
    pub fn key_for(&self, light: LightState) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let key = match light {
            LightState::Green => &self.green_light,
            LightState::Red => &self.red_light,
        };
        Some(key.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EffectsConfig {
    pub sounds: SoundConfig,
    pub boss_bar: Toggle,
    pub action_bar: Toggle,
}

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("prefix", "[RLGL] "),
    ("game-start", "Red Light, Green Light has started in {arena}!"),
    ("game-stopped", "The game in {arena} has been stopped."),
    ("green-light", "GREEN LIGHT"),
    ("red-light", "RED LIGHT"),
    ("green-light-action", "Move!"),
    ("red-light-action", "Don't move!"),
    ("eliminated", "{player} moved on red light and was eliminated!"),
    ("spectator-mode", "You are now spectating {arena}."),
    ("player-won", "{player} reached the finish in {arena}!"),
];

/// Chat message templates keyed by name, falling back to built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Messages(HashMap<String, String>);

impl Messages {
    pub fn set(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.0.insert(key.into(), template.into());
    }

    /// Template for `key`; unknown keys render as empty, matching a missing config entry.
    pub fn template(&self, key: &str) -> &str {
        if let Some(t) = self.0.get(key) {
            return t;
        }
        DEFAULT_MESSAGES
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or("")
    }

    /// Render `key`, replacing each `{name}` with its value.
    pub fn render(&self, key: &str, placeholders: &[(&str, &str)]) -> String {
        let mut message = self.template(key).to_string();
        for (name, value) in placeholders {
            message = message.replace(&format!("{{{name}}}"), value);
        }
        message
    }
}

/// Full game configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GameConfig {
    pub timers: TimerConfig,
    pub elimination: EliminationConfig,
    pub rewards: RewardConfig,
    pub effects: EffectsConfig,
    pub messages: Messages,
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: GameConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject malformed bound pairs. Collects every issue before failing.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        for (name, bounds) in [
            ("timers.green-light", self.timers.green_light),
            ("timers.red-light", self.timers.red_light),
        ] {
            if bounds.min == 0 {
                issues.push(format!("{name}.min must be at least 1"));
            }
            if bounds.min > bounds.max {
                issues.push(format!(
                    "{name}.min ({}) is greater than max ({})",
                    bounds.min, bounds.max
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ArenaError::InvalidConfig(issues.join("; ")))
        }
    }

    pub fn green_light(mut self, min: u32, max: u32) -> Self {
        self.timers.green_light = PhaseBounds::new(min, max);
        self
    }

    pub fn red_light(mut self, min: u32, max: u32) -> Self {
        self.timers.red_light = PhaseBounds::new(min, max);
        self
    }

    pub fn elimination_method(mut self, method: EliminationMethod) -> Self {
        self.elimination.method = method;
        self
    }

    pub fn spectator_mode(mut self, enabled: bool) -> Self {
        self.elimination.spectator_mode = enabled;
        self
    }

    pub fn reward_commands(mut self, commands: Vec<String>) -> Self {
        self.rewards.commands = commands;
        self
    }

    pub fn boss_bar(mut self, enabled: bool) -> Self {
        self.effects.boss_bar.enabled = enabled;
        self
    }
}
