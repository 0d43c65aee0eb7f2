//! Durable owner → watch-state document.
//!
//! [`StateStore`] is the small key-value surface the watcher depends on;
//! [`JsonFileStore`] backs it with one JSON file rewritten on every change.
//! Writes go to a sibling temp file which is then renamed over the target,
//! so a crash mid-write leaves the previous document intact.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{LiveStatus, Selector, WatchKey, WatchRecord};

/// Last statuses per watch key (`scope:selector`), then per subject id.
pub type StatusSnapshot = BTreeMap<String, BTreeMap<String, LiveStatus>>;

/// The whole document: owner user id → that owner's state.
pub type PersistedState = BTreeMap<String, OwnerState>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerState {
    #[serde(default)]
    pub watches: Vec<PersistedWatch>,
    #[serde(default)]
    pub status_memory: StatusSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWatch {
    pub scope: String,
    pub selector: Selector,
    pub channel_id: String,
    pub selector_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PersistedWatch {
    pub fn from_record(record: &WatchRecord) -> Self {
        Self {
            scope: record.key.scope.clone(),
            selector: record.key.selector.clone(),
            channel_id: record.channel_id.clone(),
            selector_text: record.selector_text.clone(),
            created_at: record.created_at,
        }
    }

    pub fn key(&self) -> WatchKey {
        WatchKey::new(self.scope.clone(), self.selector.clone())
    }

    pub fn into_record(self, owner_user_id: &str) -> WatchRecord {
        WatchRecord {
            key: self.key(),
            owner_user_id: owner_user_id.to_string(),
            channel_id: self.channel_id,
            selector_text: self.selector_text,
            created_at: self.created_at,
        }
    }
}

pub trait StateStore: Send {
    fn get(&self, owner_user_id: &str) -> Option<OwnerState>;

    fn set(&mut self, owner_user_id: &str, state: OwnerState) -> Result<()>;

    fn remove(&mut self, owner_user_id: &str) -> Result<()>;

    fn snapshot(&self) -> PersistedState;
}

pub struct JsonFileStore {
    path: PathBuf,
    state: PersistedState,
}

impl JsonFileStore {
    /// Opens the document at `path`. A missing, empty or unparsable file
    /// yields an empty document; this never fails.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let state = load(&path);
        Self { path, state }
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.state)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, &self.path)?;
        debug!("Saved watch state to {}", self.path.display());
        Ok(())
    }
}

fn load(path: &Path) -> PersistedState {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot read state file {}: {e}", path.display());
            }
            return PersistedState::new();
        }
    };

    if content.trim().is_empty() {
        debug!("State file {} is empty", path.display());
        return PersistedState::new();
    }

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(
            "State file {} is malformed, starting empty: {e}",
            path.display()
        );
        PersistedState::new()
    })
}

impl StateStore for JsonFileStore {
    fn get(&self, owner_user_id: &str) -> Option<OwnerState> {
        self.state.get(owner_user_id).cloned()
    }

    fn set(&mut self, owner_user_id: &str, state: OwnerState) -> Result<()> {
        self.state.insert(owner_user_id.to_string(), state);
        self.flush()
    }

    fn remove(&mut self, owner_user_id: &str) -> Result<()> {
        self.state.remove(owner_user_id);
        self.flush()
    }

    fn snapshot(&self) -> PersistedState {
        self.state.clone()
    }
}
