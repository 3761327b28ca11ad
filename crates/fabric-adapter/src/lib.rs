//! Fabric adapter
//!
//! Turns the desired state of SDN fabrics into downstream configuration:
//! one ONOS network configuration document per fabric, pushed over REST,
//! and one Stratum chassis config per switch, pushed with gNMI `Set`.
//! Segment-routing node IDs come from the shared store in
//! `fabric_sid_store`.
//!
//! Updates are coalesced and retried by the [`Synchronizer`]; deletes are
//! applied synchronously ahead of any pending update.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod model;
pub mod pusher;
pub mod translate;
pub mod validate;

pub use cache::{ArtifactKind, PushCache};
pub use config::{AdapterConfig, SidBackend, DEFAULT_CONFIG_PATH};
pub use engine::{DeviceSettings, DeviceSynchronizer, FabricSync, Synchronizer};
pub use error::{ConfigError, LookupError, PushError, PushOperation, SyncError, SyncResult, TranslateError};
pub use lookup::{ControllerInfo, ControllerLookup, StaticLookup};
pub use metrics::SyncMetrics;
pub use model::{ConfigForest, ConfigUpdate, ModelCatalog, RootDevice, Switch, UpdateKind};
pub use pusher::{ChassisPusher, ControllerPusher};
