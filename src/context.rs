//! Shared context handed to every arena

use crate::config::GameConfig;
use crate::elimination::EliminationPolicy;
use crate::host::Host;
use crate::scheduler::PhaseScheduler;
use crate::store::WorldStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Built once at startup and cloned into each arena task
#[derive(Clone)]
pub struct GameContext {
    config: Arc<watch::Sender<Arc<GameConfig>>>,
    pub store: WorldStore,
    pub host: Host,
    rng_seed: Option<u64>,
}

impl GameContext {
    pub fn new(config: GameConfig, store: WorldStore, host: Host) -> Self {
        let (config, _) = watch::channel(Arc::new(config));
        Self {
            config: Arc::new(config),
            store,
            host,
            rng_seed: None,
        }
    }

    /// Fix the phase-duration RNG seed for every arena created from this context
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Current configuration. Arenas take a copy when a game starts.
    pub fn config(&self) -> Arc<GameConfig> {
        self.config.borrow().clone()
    }

    /// Swap in a new configuration; running games keep the one they started with.
    pub fn replace_config(&self, config: GameConfig) {
        self.config.send_replace(Arc::new(config));
    }

    pub fn elimination_policy(&self) -> EliminationPolicy {
        let config = self.config();
        EliminationPolicy::new(config.elimination.method, config.elimination.spectator_mode)
    }

    pub fn scheduler(&self) -> PhaseScheduler {
        let timers = self.config().timers.clone();
        match self.rng_seed {
            Some(seed) => PhaseScheduler::seeded(timers, seed),
            None => PhaseScheduler::new(timers),
        }
    }
}
