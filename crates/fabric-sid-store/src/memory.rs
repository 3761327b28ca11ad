//! In-process counter/map backend.
//!
//! Clones share the same underlying state, so two [`SidAllocator`]s built on
//! clones of one `MemoryBackend` behave like two replicas talking to one
//! store.
//!
//! [`SidAllocator`]: crate::SidAllocator

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::CounterMapBackend;
use crate::error::{SidStoreError, SidStoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    counter: i64,
    map: HashMap<String, String>,
    increments: u64,
}

/// Counter and map held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Creates an empty backend with the counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend whose counter starts at `value`.
    pub fn with_counter(value: i64) -> Self {
        let backend = Self::new();
        backend.state.lock().counter = value;
        backend
    }

    /// Current counter value.
    pub fn counter(&self) -> i64 {
        self.state.lock().counter
    }

    /// Number of increments performed since creation.
    pub fn increments(&self) -> u64 {
        self.state.lock().increments
    }

    /// Number of switch mappings stored.
    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    /// Returns true if no mapping has been stored.
    pub fn is_empty(&self) -> bool {
        self.state.lock().map.is_empty()
    }

    /// Writes a raw map entry, bypassing allocation.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.lock().map.insert(key.into(), value.into());
    }
}

#[async_trait]
impl CounterMapBackend for MemoryBackend {
    async fn reserve_below(&self, floor: i64) -> SidStoreResult<i64> {
        let mut state = self.state.lock();
        if state.counter < floor {
            state.counter = floor;
        }
        Ok(state.counter)
    }

    async fn increment(&self) -> SidStoreResult<i64> {
        let mut state = self.state.lock();
        state.counter = state
            .counter
            .checked_add(1)
            .ok_or(SidStoreError::Overflow(state.counter))?;
        state.increments += 1;
        Ok(state.counter)
    }

    async fn map_get(&self, key: &str) -> SidStoreResult<Option<String>> {
        Ok(self.state.lock().map.get(key).cloned())
    }

    async fn map_put_if_absent(&self, key: &str, value: &str) -> SidStoreResult<bool> {
        let mut state = self.state.lock();
        if state.map.contains_key(key) {
            return Ok(false);
        }
        state.map.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
