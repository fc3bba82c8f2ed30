//! Host engine collaborators
//!
//! The arena calls out through these traits after it has committed a state
//! change. Calls must not block; failures come back as [`EffectError`] and the
//! arena logs them and moves on.

use crate::error::EffectError;
use crate::types::{LightState, PlayerId, Position};
use std::sync::Arc;

pub type EffectResult = std::result::Result<(), EffectError>;

/// Everything shown to players when the light changes
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEffect {
    pub arena: String,
    pub light: LightState,
    pub title: String,
    pub action_bar: Option<String>,
    pub sound: Option<String>,
}

/// Chat, titles and the progress bar
pub trait Presenter: Send + Sync {
    fn broadcast(&self, recipients: &[PlayerId], message: &str) -> EffectResult;

    fn send(&self, player: PlayerId, message: &str) -> EffectResult;

    fn show_phase_effect(&self, players: &[PlayerId], effect: &PhaseEffect) -> EffectResult;

    /// `fraction` is in `[0, 1]`
    fn update_progress(&self, arena: &str, players: &[PlayerId], fraction: f64) -> EffectResult;

    fn clear_progress(&self, arena: &str) -> EffectResult;
}

/// Actions applied to a single player's avatar
pub trait PlayerEffects: Send + Sync {
    fn kill(&self, player: PlayerId) -> EffectResult;

    fn kick(&self, player: PlayerId, message: &str) -> EffectResult;

    fn teleport(&self, player: PlayerId, to: &Position) -> EffectResult;

    fn set_spectator(&self, player: PlayerId) -> EffectResult;

    fn strike_lightning(&self, player: PlayerId) -> EffectResult;
}

/// Runs privileged reward commands
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, command: &str) -> EffectResult;
}

/// Bundle of collaborators handed to every arena
#[derive(Clone)]
pub struct Host {
    pub presenter: Arc<dyn Presenter>,
    pub effects: Arc<dyn PlayerEffects>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
}

impl Host {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        effects: Arc<dyn PlayerEffects>,
        dispatcher: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self {
            presenter,
            effects,
            dispatcher,
        }
    }

    /// Use one object for all three roles
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: Presenter + PlayerEffects + CommandDispatcher + 'static,
    {
        Self {
            presenter: host.clone(),
            effects: host.clone(),
            dispatcher: host,
        }
    }
}
