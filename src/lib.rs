//! # rlgl-arena
//!
//! Red light / green light elimination minigame engine for a live
//! multiplayer world.
//!
//! ## Features
//!
//! - **Phase Loop**: Randomized green/red durations, one tick per second
//! - **Movement Monitor**: Moving on red eliminates non-immune players
//! - **Finish Detection**: Reaching the finish block wins and runs rewards
//! - **Elimination Methods**: Kill, Kick or Teleport, with optional spectating
//! - **Multiple Arenas**: Independent games, each owned by its own task
//!
//! ## Example
//!
//! ```rust,ignore
//! use rlgl_arena::{ArenaRegistry, GameConfig, GameContext, Host, WorldStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::load("config.yml")?;
//!     let store = WorldStore::open("data.json")?;
//!     let ctx = GameContext::new(config, store, Host::from_shared(my_host));
//!     let registry = ArenaRegistry::new(ctx);
//!
//!     let arena = registry.get_or_create("default").await;
//!     arena.add_player(player_id, "Ann").await?;
//!     arena.start_game().await?;
//!
//!     // From the host's movement hook:
//!     if registry.route_movement(player_id, from, to).await? == MoveVerdict::Denied {
//!         // cancel the move
//!     }
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod config;
pub mod context;
pub mod elimination;
pub mod error;
pub mod host;
pub mod logging;
pub mod registry;
pub mod rewards;
pub mod scheduler;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use arena::{Arena, ArenaEvent, StopReason};
pub use config::{GameConfig, PhaseBounds};
pub use context::GameContext;
pub use elimination::{EliminationMethod, EliminationPolicy};
pub use error::{ArenaError, EffectError, Result};
pub use host::{CommandDispatcher, Host, PhaseEffect, PlayerEffects, Presenter};
pub use registry::{ArenaRegistry, DEFAULT_ARENA};
pub use scheduler::PhaseScheduler;
pub use store::{Lobby, RoleStore, WorldStore};
pub use types::*;
