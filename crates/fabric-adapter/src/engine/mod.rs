//! Scheduling of synchronization work.
//!
//! - [`Mailbox`]: single-slot coalescing queue between callbacks and worker
//! - [`DeviceSynchronizer`]: one full pass over a forest (translate + push)
//! - [`Synchronizer`]: callback entry point, worker, retries and deletes

pub mod device;
pub mod mailbox;
pub mod synchronizer;

pub use device::{DeviceSettings, DeviceSynchronizer, FabricSync};
pub use mailbox::Mailbox;
pub use synchronizer::{Synchronizer, DEFAULT_RETRY_INTERVAL};
