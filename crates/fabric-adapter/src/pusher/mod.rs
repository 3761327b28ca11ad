//! Delivery of translated artifacts to their targets.
//!
//! The engine only sees the two capability traits below. Production code
//! uses [`RestPusher`] and [`GnmiPusher`]; tests use the in-memory doubles in
//! [`memory`].

use async_trait::async_trait;

use crate::error::PushError;

pub mod gnmi;
pub mod memory;
pub mod rest;

pub use gnmi::{GnmiPusher, PayloadEncoding, SetClient, TonicSetClient};
pub use memory::{MemoryChassisPusher, MemoryControllerPusher};
pub use rest::RestPusher;

/// Pushes netconfig documents to a controller.
#[async_trait]
pub trait ControllerPusher: Send + Sync {
    /// POSTs `payload` (JSON) to `endpoint` with basic auth.
    async fn push_update(
        &self,
        endpoint: &str,
        username: &str,
        password: &str,
        payload: &[u8],
    ) -> Result<(), PushError>;

    /// DELETEs the resource at `endpoint`.
    async fn push_delete(&self, endpoint: &str) -> Result<(), PushError>;
}

/// Pushes chassis configs to a switch's device agent.
#[async_trait]
pub trait ChassisPusher: Send + Sync {
    /// Sets the chassis config of the agent at `endpoint`.
    async fn push_update(&self, endpoint: &str, payload: &str) -> Result<(), PushError>;

    /// Removes the chassis config of the agent at `endpoint`.
    async fn push_delete(&self, endpoint: &str) -> Result<(), PushError>;
}
