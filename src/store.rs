//! Roles and locations shared by every arena
//!
//! Persisted as a small JSON document. Every mutation schedules a background
//! write; a failed write is logged and the in-memory state stays authoritative.

use crate::error::{ArenaError, Result};
use crate::types::{BlockPos, PlayerId, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Global identity sets. Membership in any of them grants immunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleStore {
    pub admins: HashSet<PlayerId>,
    pub guests: HashSet<PlayerId>,
    pub winners: HashSet<PlayerId>,
}

impl RoleStore {
    pub fn is_admin(&self, id: &PlayerId) -> bool {
        self.admins.contains(id)
    }

    pub fn is_guest(&self, id: &PlayerId) -> bool {
        self.guests.contains(id)
    }

    pub fn is_winner(&self, id: &PlayerId) -> bool {
        self.winners.contains(id)
    }

    pub fn is_immune(&self, id: &PlayerId) -> bool {
        self.is_admin(id) || self.is_guest(id) || self.is_winner(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Locations {
    pub lobby: Option<Position>,
    pub guest_lobby: Option<Position>,
    pub finish: Option<BlockPos>,
}

/// Which of the two lobby locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lobby {
    /// Where eliminated players are sent
    Game,
    Guest,
}

impl Lobby {
    pub fn label(self) -> &'static str {
        match self {
            Lobby::Game => "lobby",
            Lobby::Guest => "guest lobby",
        }
    }
}

impl FromStr for Lobby {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lobby" | "gamelobby" => Ok(Lobby::Game),
            "guestlobby" => Ok(Lobby::Guest),
            other => Err(ArenaError::InvalidConfig(format!("unknown lobby: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldData {
    pub roles: RoleStore,
    pub locations: Locations,
}

/// Cheap to clone; clones share the same data.
#[derive(Clone)]
pub struct WorldStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    data: RwLock<WorldData>,
    write_lock: Mutex<()>,
}

impl StoreInner {
    /// Writers queue on `write_lock` and read the data only once they hold it,
    /// so the last write always carries the latest state.
    async fn write_latest(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string_pretty(&*self.data.read().await)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn read_data(path: &Path) -> Result<WorldData> {
    if !path.exists() {
        debug!("No data file at {}, starting empty", path.display());
        return Ok(WorldData::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

impl WorldStore {
    /// Purely in-memory store
    pub fn in_memory() -> Self {
        Self::with_data(WorldData::default())
    }

    pub fn with_data(data: WorldData) -> Self {
        Self::build(None, data)
    }

    /// Load from `path`; a missing file starts empty and is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = read_data(&path)?;
        Ok(Self::build(Some(path), data))
    }

    /// Replace the in-memory data with the file's contents. No-op for an in-memory store.
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        // Let queued writes land before reading
        let _guard = self.inner.write_lock.lock().await;
        let data = read_data(path)?;
        *self.inner.data.write().await = data;
        debug!("Reloaded world data from {}", path.display());
        Ok(())
    }

    fn build(path: Option<PathBuf>, data: WorldData) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path,
                data: RwLock::new(data),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub async fn snapshot(&self) -> WorldData {
        self.inner.data.read().await.clone()
    }

    /// Write the current data to disk and wait for it
    pub async fn save(&self) -> Result<()> {
        self.inner.write_latest().await
    }

    fn persist(&self) {
        if self.inner.path.is_none() {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = inner.write_latest().await {
                warn!("Failed to save world data: {}", e);
            }
        });
    }

    async fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut WorldData) -> bool,
    {
        let changed = f(&mut *self.inner.data.write().await);
        if changed {
            self.persist();
        }
        changed
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn is_immune(&self, id: &PlayerId) -> bool {
        self.inner.data.read().await.roles.is_immune(id)
    }

    pub async fn is_admin(&self, id: &PlayerId) -> bool {
        self.inner.data.read().await.roles.is_admin(id)
    }

    pub async fn is_guest(&self, id: &PlayerId) -> bool {
        self.inner.data.read().await.roles.is_guest(id)
    }

    pub async fn is_winner(&self, id: &PlayerId) -> bool {
        self.inner.data.read().await.roles.is_winner(id)
    }

    pub async fn admins(&self) -> Vec<PlayerId> {
        self.inner.data.read().await.roles.admins.iter().copied().collect()
    }

    pub async fn guests(&self) -> Vec<PlayerId> {
        self.inner.data.read().await.roles.guests.iter().copied().collect()
    }

    pub async fn add_admin(&self, id: PlayerId) -> bool {
        self.mutate(|d| d.roles.admins.insert(id)).await
    }

    pub async fn remove_admin(&self, id: &PlayerId) -> bool {
        self.mutate(|d| d.roles.admins.remove(id)).await
    }

    pub async fn add_guest(&self, id: PlayerId) -> bool {
        self.mutate(|d| d.roles.guests.insert(id)).await
    }

    pub async fn remove_guest(&self, id: &PlayerId) -> bool {
        self.mutate(|d| d.roles.guests.remove(id)).await
    }

    /// Winners are never removed.
    pub async fn add_winner(&self, id: PlayerId) -> bool {
        self.mutate(|d| d.roles.winners.insert(id)).await
    }

    // =========================================================================
    // Locations
    // =========================================================================

    pub async fn lobby(&self) -> Option<Position> {
        self.inner.data.read().await.locations.lobby.clone()
    }

    pub async fn guest_lobby(&self) -> Option<Position> {
        self.inner.data.read().await.locations.guest_lobby.clone()
    }

    pub async fn finish(&self) -> Option<BlockPos> {
        self.inner.data.read().await.locations.finish.clone()
    }

    pub async fn require_lobby(&self) -> Result<Position> {
        self.require(Lobby::Game).await
    }

    pub async fn require_guest_lobby(&self) -> Result<Position> {
        self.require(Lobby::Guest).await
    }

    pub async fn require(&self, lobby: Lobby) -> Result<Position> {
        let data = self.inner.data.read().await;
        let position = match lobby {
            Lobby::Game => data.locations.lobby.clone(),
            Lobby::Guest => data.locations.guest_lobby.clone(),
        };
        position.ok_or(ArenaError::LocationNotSet(lobby.label()))
    }

    pub async fn set_lobby(&self, position: Position) {
        self.mutate(|d| {
            d.locations.lobby = Some(position);
            true
        })
        .await;
    }

    pub async fn set_guest_lobby(&self, position: Position) {
        self.mutate(|d| {
            d.locations.guest_lobby = Some(position);
            true
        })
        .await;
    }

    pub async fn set_finish(&self, block: BlockPos) {
        self.mutate(|d| {
            d.locations.finish = Some(block);
            true
        })
        .await;
    }
}
