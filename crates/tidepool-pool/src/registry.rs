//! Process-wide slot registry

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::slot::Slot;

/// Table of every registered slot, keyed by connection name.
///
/// Writes happen only at pool init and teardown; `lookup` runs on every
/// borrow and is a single read-locked hash probe.
#[derive(Default)]
pub struct SlotRegistry {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
}

impl SlotRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot under its connection name
    pub fn add(&self, slot: Arc<Slot>) {
        tracing::debug!(slot = %slot.name(), "registering slot");
        self.slots.write().insert(slot.name().to_string(), slot);
    }

    /// Get a slot by connection name
    pub fn lookup(&self, name: &str) -> Option<Arc<Slot>> {
        self.slots.read().get(name).cloned()
    }

    /// Remove a slot by connection name
    pub fn remove(&self, name: &str) -> Option<Arc<Slot>> {
        self.slots.write().remove(name)
    }

    /// Drop every registered slot
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Number of registered slots
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no slots are registered
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}
