//! Lookup-or-create SID allocation.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::backend::CounterMapBackend;
use crate::error::{SidStoreError, SidStoreResult};

/// SIDs below this value are reserved and never allocated.
pub const RESERVED_SIDS: i64 = 100;

/// Allocation contract consumed by the synchronizer.
#[async_trait]
pub trait SidStore: Send + Sync {
    /// Returns the SID of `switch_id`, allocating one on first sight.
    ///
    /// Repeated calls for the same switch return the same SID. Distinct
    /// switches never share a SID.
    async fn allocate(&self, switch_id: &str) -> SidStoreResult<u32>;

    /// Releases the store. Allocation fails with [`SidStoreError::Closed`]
    /// afterwards.
    async fn close(&self) -> SidStoreResult<()>;
}

/// [`SidStore`] over any [`CounterMapBackend`].
///
/// Allocation is not a single transaction: a new SID is taken from the
/// counter first and the mapping is then written with put-if-absent. A caller
/// that loses the race for the mapping reads back the winner's SID, and the
/// SID it incremented to is simply never used.
pub struct SidAllocator<B> {
    backend: B,
    closed: AtomicBool,
}

impl<B: CounterMapBackend> SidAllocator<B> {
    /// Creates an allocator, raising the counter to [`RESERVED_SIDS`] if it
    /// is below it.
    pub async fn new(backend: B) -> SidStoreResult<Self> {
        let start = backend.reserve_below(RESERVED_SIDS).await.map_err(|e| {
            warn!(backend = backend.name(), error = %e, "Error initializing SID counter");
            e
        })?;
        info!(backend = backend.name(), counter = start, "SID store ready");

        Ok(Self {
            backend,
            closed: AtomicBool::new(false),
        })
    }

    /// The backend this allocator runs on.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn decode(switch_id: &str, value: String) -> SidStoreResult<u32> {
        value.parse::<u32>().map_err(|_| SidStoreError::Corrupt {
            switch_id: switch_id.to_string(),
            value,
        })
    }
}

#[async_trait]
impl<B: CounterMapBackend> SidStore for SidAllocator<B> {
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    async fn allocate(&self, switch_id: &str) -> SidStoreResult<u32> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SidStoreError::Closed);
        }
        if switch_id.is_empty() {
            return Err(SidStoreError::InvalidArgument(
                "ID cannot be empty".to_string(),
            ));
        }

        if let Some(value) = self.backend.map_get(switch_id).await? {
            let sid = Self::decode(switch_id, value)?;
            debug!(sid, "Switch found");
            return Ok(sid);
        }

        // The counter holds the next unallocated SID.
        let next = self.backend.increment().await? - 1;
        let sid = u32::try_from(next).map_err(|_| SidStoreError::Overflow(next))?;

        if self
            .backend
            .map_put_if_absent(switch_id, &sid.to_string())
            .await?
        {
            info!(sid, "Allocated new SID");
            return Ok(sid);
        }

        // Another replica mapped this switch between our lookup and put.
        match self.backend.map_get(switch_id).await? {
            Some(value) => {
                let winner = Self::decode(switch_id, value)?;
                debug!(wasted = sid, sid = winner, "Lost SID allocation race");
                Ok(winner)
            }
            None => Err(SidStoreError::backend(
                "map_get",
                format!("mapping for {} vanished after conflicting put", switch_id),
            )),
        }
    }

    async fn close(&self) -> SidStoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_first_allocation_starts_at_reserved_floor() {
        let store = SidAllocator::new(MemoryBackend::new()).await.unwrap();
        assert_eq!(store.allocate("leaf-one").await.unwrap(), 100);
        assert_eq!(store.allocate("spine-one").await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_counter_above_floor_is_kept() {
        let store = SidAllocator::new(MemoryBackend::with_counter(500))
            .await
            .unwrap();
        assert_eq!(store.allocate("leaf-one").await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_repeat_allocation_does_not_increment() {
        let backend = MemoryBackend::new();
        let store = SidAllocator::new(backend.clone()).await.unwrap();

        let first = store.allocate("leaf-one").await.unwrap();
        let second = store.allocate("leaf-one").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.increments(), 1);
    }

    #[tokio::test]
    async fn test_empty_switch_id_rejected() {
        let store = SidAllocator::new(MemoryBackend::new()).await.unwrap();
        let err = store.allocate("").await.unwrap_err();
        assert!(matches!(err, SidStoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_allocate_after_close_fails() {
        let store = SidAllocator::new(MemoryBackend::new()).await.unwrap();
        store.allocate("leaf-one").await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.allocate("leaf-one").await,
            Err(SidStoreError::Closed)
        ));
        // Closing twice is harmless.
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_lost_race_returns_winner() {
        let backend = MemoryBackend::new();

        // Simulates another replica writing the mapping after our lookup:
        // the put fails, and the stored value must win.
        struct RacingBackend {
            inner: MemoryBackend,
        }

        #[async_trait]
        impl CounterMapBackend for RacingBackend {
            async fn reserve_below(&self, floor: i64) -> SidStoreResult<i64> {
                self.inner.reserve_below(floor).await
            }
            async fn increment(&self) -> SidStoreResult<i64> {
                let value = self.inner.increment().await?;
                self.inner.insert_raw("leaf-one", "777");
                Ok(value)
            }
            async fn map_get(&self, key: &str) -> SidStoreResult<Option<String>> {
                self.inner.map_get(key).await
            }
            async fn map_put_if_absent(&self, key: &str, value: &str) -> SidStoreResult<bool> {
                self.inner.map_put_if_absent(key, value).await
            }
            fn name(&self) -> &str {
                "racing"
            }
        }

        let racing = SidAllocator::new(RacingBackend {
            inner: backend.clone(),
        })
        .await
        .unwrap();

        assert_eq!(racing.allocate("leaf-one").await.unwrap(), 777);
        assert_eq!(racing.allocate("leaf-one").await.unwrap(), 777);
        assert_eq!(backend.counter(), 101);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reported() {
        let backend = MemoryBackend::new();
        backend.insert_raw("leaf-one", "not-a-number");
        let store = SidAllocator::new(backend).await.unwrap();

        match store.allocate("leaf-one").await {
            Err(SidStoreError::Corrupt { switch_id, value }) => {
                assert_eq!(switch_id, "leaf-one");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }
}
