use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;

struct Slot<T> {
    value: Arc<Mutex<T>>,
    last_used: DateTime<Utc>,
}

/// In-memory map of live sessions. Each value sits behind its own async
/// mutex so one session's turn never blocks another's.
pub struct SessionStore<T> {
    slots: RwLock<HashMap<String, Slot<T>>>,
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> SessionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores `value` under `id`, replacing any previous entry.
    pub fn insert(&self, id: impl Into<String>, value: T) -> Arc<Mutex<T>> {
        let value = Arc::new(Mutex::new(value));
        self.slots.write().insert(
            id.into(),
            Slot {
                value: Arc::clone(&value),
                last_used: Utc::now(),
            },
        );
        value
    }

    /// Returns the session and marks it as used.
    pub fn get(&self, id: &str) -> Option<Arc<Mutex<T>>> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(id)?;
        slot.last_used = Utc::now();
        Some(Arc::clone(&slot.value))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.read().contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Mutex<T>>> {
        self.slots.write().remove(id).map(|slot| slot.value)
    }

    /// Drops every session unused for longer than `idle`. Sessions with a turn
    /// in flight are kept.
    pub fn purge_idle(&self, now: DateTime<Utc>, idle: Duration) -> u64 {
        let mut removed = 0_u64;
        self.slots.write().retain(|_, slot| {
            let busy = Arc::strong_count(&slot.value) > 1;
            let keep = busy || now - slot.last_used <= idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}
