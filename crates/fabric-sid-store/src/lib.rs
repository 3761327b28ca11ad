//! Segment-routing node ID allocation for fabric switches.
//!
//! Every switch managed by the fabric adapter needs a small integer that
//! identifies it for segment-routing forwarding. IDs must never collide, not
//! even across restarts or across several adapter replicas, so they are kept
//! in a shared linearizable store:
//!
//! - a counter that hands out the next free ID, and
//! - a map from switch ID to the ID it was given.
//!
//! The crate is split the same way:
//!
//! - [`CounterMapBackend`]: the minimal counter + map capability
//! - [`MemoryBackend`]: in-process backend, shareable between store instances
//! - [`RedisBackend`]: backend on a Redis server (INCR / HGET / HSETNX)
//! - [`SidStore`]: the allocation contract the synchronizer consumes
//! - [`SidAllocator`]: the one implementation of [`SidStore`], generic over
//!   the backend
//!
//! # Example
//!
//! ```
//! use fabric_sid_store::{MemoryBackend, SidAllocator, SidStore};
//!
//! # tokio_test_block(async {
//! let store = SidAllocator::new(MemoryBackend::new()).await.unwrap();
//! let leaf = store.allocate("leaf-1").await.unwrap();
//! assert_eq!(leaf, 100);
//! assert_eq!(store.allocate("leaf-1").await.unwrap(), leaf);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod allocator;
mod backend;
mod error;
mod memory;
mod redis_backend;

pub use allocator::{SidAllocator, SidStore, RESERVED_SIDS};
pub use backend::CounterMapBackend;
pub use error::{SidStoreError, SidStoreResult};
pub use memory::MemoryBackend;
pub use redis_backend::{RedisBackend, SID_COUNTER_KEY, SID_MAP_KEY};
