//! Persisted engine state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{SessionId, StreamStatus};
use crate::{Error, Result};

/// Snapshot schema version written by this build.
pub const STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    STATE_VERSION
}

/// Everything the engine needs to resume after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub last_status: StreamStatus,
    /// Highest milestone notified in the current session.
    #[serde(default)]
    pub last_notified_milestone: Option<u64>,
    /// Last dispatch decision per cooldown key.
    #[serde(default)]
    pub last_notification_at: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub current_session_id: Option<SessionId>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_status: StreamStatus::offline(),
            last_notified_milestone: None,
            last_notification_at: BTreeMap::new(),
            current_session_id: None,
        }
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        self.last_status.is_live
    }

    pub fn last_sent(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last_notification_at.get(key).copied()
    }

    pub fn record_sent(&mut self, key: String, at: DateTime<Utc>) {
        self.last_notification_at.insert(key, at);
    }
}

/// Loads and saves [`EngineState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved state, or `None` on first run.
    async fn load(&self) -> Result<Option<EngineState>>;

    /// Persist `state`, replacing any previous snapshot.
    async fn save(&self, state: &EngineState) -> Result<()>;
}

/// JSON file store with atomic replace.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> Result<Option<EngineState>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted state found");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let state = match serde_json::from_str::<EngineState>(&json) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to parse persisted state, starting fresh"
                );
                return Ok(None);
            }
        };

        if state.version > STATE_VERSION {
            return Err(Error::persistence(format!(
                "State file {} has version {}, this build supports up to {}",
                self.path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        info!(
            path = %self.path.display(),
            live = state.last_status.is_live,
            "Restored engine state"
        );
        Ok(Some(state))
    }

    async fn save(&self, state: &EngineState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::persistence(format!("Failed to serialize state: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!("Failed to create state directory: {}", e))
            })?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| Error::persistence(format!("Failed to write state file: {}", e)))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::persistence(format!("Failed to rename state file: {}", e)))?;

        debug!(path = %self.path.display(), "State persisted");
        Ok(())
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<EngineState>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Option<EngineState> {
        self.state.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<EngineState>> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &EngineState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::persistence("simulated write failure"));
        }
        *self.state.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
