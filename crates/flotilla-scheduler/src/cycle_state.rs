//! Per-cycle scratch state shared between plugin stages

use crate::{Result, SchedulerError};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Key under which a plugin stores its state, usually the plugin name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque value stored in the cycle state
pub type StateData = Arc<dyn Any + Send + Sync>;

/// Scratch state for one scheduling cycle
///
/// Writes happen during the single-threaded PreFilter and PreScore stages;
/// the per-cluster Filter and Score stages only read. The lock makes
/// concurrent reads from worker tasks safe.
pub struct CycleState {
    cycle_id: Uuid,
    store: RwLock<HashMap<StateKey, StateData>>,
    skipped_filter_plugins: RwLock<HashSet<String>>,
    skipped_score_plugins: RwLock<HashSet<String>>,
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            store: RwLock::new(HashMap::new()),
            skipped_filter_plugins: RwLock::new(HashSet::new()),
            skipped_score_plugins: RwLock::new(HashSet::new()),
        }
    }

    /// Identifier of the cycle, used to correlate log lines
    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    /// Store a value, replacing any previous value under the same key
    pub fn write<T: Any + Send + Sync>(&self, key: impl Into<StateKey>, value: T) {
        self.store
            .write()
            .insert(key.into(), Arc::new(value));
    }

    /// Fetch the raw value stored under a key
    pub fn read_raw(&self, key: &StateKey) -> Option<StateData> {
        self.store.read().get(key).cloned()
    }

    /// Fetch a value of a known type
    ///
    /// A missing key or a value of another type is an `InvalidState` error.
    pub fn read<T: Any + Send + Sync>(&self, key: &StateKey) -> Result<Arc<T>> {
        let data = self.read_raw(key).ok_or_else(|| {
            SchedulerError::invalid_state(format!("no state written under key {}", key))
        })?;

        data.downcast::<T>().map_err(|_| {
            SchedulerError::invalid_state(format!(
                "state under key {} is not a {}",
                key,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Mark a plugin as opted out of the Filter stage
    pub fn skip_filter(&self, plugin: &str) {
        self.skipped_filter_plugins.write().insert(plugin.to_string());
    }

    pub fn is_filter_skipped(&self, plugin: &str) -> bool {
        self.skipped_filter_plugins.read().contains(plugin)
    }

    /// Mark a plugin as opted out of the Score stage
    pub fn skip_score(&self, plugin: &str) {
        self.skipped_score_plugins.write().insert(plugin.to_string());
    }

    pub fn is_score_skipped(&self, plugin: &str) -> bool {
        self.skipped_score_plugins.read().contains(plugin)
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.store.read().keys().map(|k| k.to_string()).collect();
        f.debug_struct("CycleState")
            .field("cycle_id", &self.cycle_id)
            .field("keys", &keys)
            .finish()
    }
}
