use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::kind::ItemKind;
use crate::planner::ScheduleMap;
use crate::storage::{Storage, StorageError};

#[derive(Debug)]
pub enum StoreError {
    Storage(StorageError),
    Json(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Storage(err) => write!(f, "{}", err),
            StoreError::Json(err) => write!(f, "failed to encode schedule state: {}", err),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Storage(err) => Some(err),
            StoreError::Json(err) => Some(err),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        StoreError::Storage(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Json(value)
    }
}

/// Persisted schedule states and mute registry for one item kind.
///
/// Schedule state and mutes live under separate keys, so a schedule save from
/// one context never overwrites a mute written by another.
pub struct ScheduleStore<S> {
    storage: S,
    kind: ItemKind,
    states: ScheduleMap,
    muted: BTreeSet<String>,
}

impl<S: Storage> ScheduleStore<S> {
    pub fn open(storage: S, kind: ItemKind) -> Result<Self, StoreError> {
        let mut store = Self {
            storage,
            kind,
            states: ScheduleMap::new(),
            muted: BTreeSet::new(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn load(&mut self) -> Result<(), StoreError> {
        self.states = self.read_key(&self.kind.schedule_key())?;
        self.muted = self.read_key(&self.kind.muted_key())?;
        Ok(())
    }

    pub fn states(&self) -> &ScheduleMap {
        &self.states
    }

    pub fn muted(&self) -> &BTreeSet<String> {
        &self.muted
    }

    /// Persists `states`. Nothing is written when they match what is already held.
    pub fn save(&mut self, states: ScheduleMap) -> Result<bool, StoreError> {
        if states == self.states {
            return Ok(false);
        }
        let encoded = serde_json::to_string(&states)?;
        self.storage.set(&self.kind.schedule_key(), &encoded)?;
        self.states = states;
        Ok(true)
    }

    /// Reloads whatever other contexts changed since the last call.
    pub fn refresh_if_changed(&mut self) -> Result<bool, StoreError> {
        let changed = self.storage.take_changes()?;
        let schedule_key = self.kind.schedule_key();
        let muted_key = self.kind.muted_key();
        let mut refreshed = false;
        if changed.contains(&schedule_key) {
            self.states = self.read_key(&schedule_key)?;
            refreshed = true;
        }
        if changed.contains(&muted_key) {
            self.muted = self.read_key(&muted_key)?;
            refreshed = true;
        }
        if refreshed {
            debug!(kind = self.kind.as_str(), "reloaded state changed by another context");
        }
        Ok(refreshed)
    }

    pub fn is_muted(&self, id: &str) -> bool {
        self.muted.contains(id)
    }

    pub fn mute(&mut self, id: &str) -> Result<bool, StoreError> {
        self.update_mutes(|muted| muted.insert(id.to_string()))
    }

    pub fn unmute(&mut self, id: &str) -> Result<bool, StoreError> {
        self.update_mutes(|muted| muted.remove(id))
    }

    /// Drops mutes for ids that `keep` rejects.
    pub fn retain_mutes<F>(&mut self, keep: F) -> Result<bool, StoreError>
    where
        F: Fn(&str) -> bool,
    {
        self.update_mutes(|muted| {
            let before = muted.len();
            muted.retain(|id| keep(id));
            muted.len() != before
        })
    }

    /// Drops one item's schedule state so the next reconciliation starts fresh.
    pub fn forget(&mut self, id: &str) -> Result<bool, StoreError> {
        let schedule_key = self.kind.schedule_key();
        let mut states: ScheduleMap = self.read_key(&schedule_key)?;
        let removed = states.remove(id).is_some();
        if removed {
            let encoded = serde_json::to_string(&states)?;
            self.storage.set(&schedule_key, &encoded)?;
        }
        self.states = states;
        Ok(removed)
    }

    // Re-reads the persisted set first so concurrent mutes from other
    // contexts survive.
    fn update_mutes<F>(&mut self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut BTreeSet<String>) -> bool,
    {
        let muted_key = self.kind.muted_key();
        let mut muted: BTreeSet<String> = self.read_key(&muted_key)?;
        let changed = change(&mut muted);
        if changed {
            let encoded = serde_json::to_string(&muted)?;
            self.storage.set(&muted_key, &encoded)?;
        }
        self.muted = muted;
        Ok(changed)
    }

    fn read_key<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable persisted value");
                Ok(T::default())
            }
        }
    }
}
