//! The counter + map capability SID allocation is built on.

use async_trait::async_trait;

use crate::error::SidStoreResult;

/// A linearizable counter and string-keyed map.
///
/// Any service that offers atomic increment, get, and put-if-absent can back
/// the allocator. Increments are monotonic; a value handed out by
/// [`increment`](CounterMapBackend::increment) is never handed out again.
#[async_trait]
pub trait CounterMapBackend: Send + Sync {
    /// Raises the counter to `floor` if it is currently below it.
    ///
    /// Returns the counter value after the call.
    async fn reserve_below(&self, floor: i64) -> SidStoreResult<i64>;

    /// Atomically increments the counter and returns the new value.
    async fn increment(&self) -> SidStoreResult<i64>;

    /// Looks up the value stored for `key`.
    async fn map_get(&self, key: &str) -> SidStoreResult<Option<String>>;

    /// Stores `value` under `key` unless the key already exists.
    ///
    /// Returns true if this call created the entry.
    async fn map_put_if_absent(&self, key: &str, value: &str) -> SidStoreResult<bool>;

    /// Releases the handles held by this backend.
    async fn close(&self) -> SidStoreResult<()> {
        Ok(())
    }

    /// Backend name for logging.
    fn name(&self) -> &str;
}
