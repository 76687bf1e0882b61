//! Session store
//!
//! In-memory store for recovery bookkeeping: which components are disabled,
//! state snapshots taken before risky operations, restored state awaiting
//! pickup, and recovery context persisted across a requested reload. Values
//! are JSON so hosts can store arbitrary state shapes.

use dashmap::DashMap;
use loopguard_kernel::types::ComponentId;
use serde_json::Value;

/// Keys used for reload-surviving recovery context.
pub const RECOVERY_DATA_KEY: &str = "recovery-context";

/// Concurrent store of per-component recovery state.
#[derive(Debug, Default)]
pub struct SessionStore {
    disabled: DashMap<ComponentId, ()>,
    snapshots: DashMap<ComponentId, Value>,
    restored: DashMap<ComponentId, Value>,
    recovery_data: DashMap<String, Value>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `component` disabled.
    pub fn disable(&self, component: &ComponentId) {
        self.disabled.insert(component.clone(), ());
    }

    /// Clear `component`'s disabled mark.
    pub fn enable(&self, component: &ComponentId) {
        self.disabled.remove(component);
    }

    /// Whether `component` is currently disabled.
    #[must_use]
    pub fn is_disabled(&self, component: &ComponentId) -> bool {
        self.disabled.contains_key(component)
    }

    /// Store a state snapshot for `component`, replacing any previous one.
    pub fn store_snapshot(&self, component: &ComponentId, state: Value) {
        self.snapshots.insert(component.clone(), state);
    }

    /// The stored snapshot for `component`, if any.
    #[must_use]
    pub fn snapshot(&self, component: &ComponentId) -> Option<Value> {
        self.snapshots.get(component).map(|v| v.clone())
    }

    /// Stage restored state for the host to pick up.
    pub fn store_restored_state(&self, component: &ComponentId, state: Value) {
        self.restored.insert(component.clone(), state);
    }

    /// Take staged restored state, removing it from the store.
    #[must_use]
    pub fn take_restored_state(&self, component: &ComponentId) -> Option<Value> {
        self.restored.remove(component).map(|(_, v)| v)
    }

    /// Persist recovery context under `key` so it survives a reload.
    pub fn store_recovery_data(&self, key: &str, data: Value) {
        self.recovery_data.insert(key.to_string(), data);
    }

    /// Take persisted recovery context for `key`.
    #[must_use]
    pub fn take_recovery_data(&self, key: &str) -> Option<Value> {
        self.recovery_data.remove(key).map(|(_, v)| v)
    }

    /// Components currently marked disabled.
    #[must_use]
    pub fn disabled_components(&self) -> Vec<ComponentId> {
        self.disabled.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop everything.
    pub fn reset(&self) {
        self.disabled.clear();
        self.snapshots.clear();
        self.restored.clear();
        self.recovery_data.clear();
    }
}
