//! Cache of the last artifact successfully pushed per fabric.
//!
//! Artifacts are compared structurally: each one is stored as a
//! `serde_json::Value` snapshot and compared with `==`. Nothing is hashed, so
//! two different artifacts can never compare equal.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Kind of downstream artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// ONOS network configuration document.
    NetConfig,
    /// Stratum chassis configuration.
    ChassisConfig,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::NetConfig => f.write_str("netconfig"),
            ArtifactKind::ChassisConfig => f.write_str("chassis"),
        }
    }
}

/// Snapshot store keyed by `(kind, fabric)`.
#[derive(Debug, Default)]
pub struct PushCache {
    entries: Mutex<HashMap<(ArtifactKind, String), Value>>,
}

impl PushCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot<T: Serialize>(kind: ArtifactKind, fabric: &str, artifact: &T) -> Option<Value> {
        match serde_json::to_value(artifact) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%kind, fabric, error = %e, "Unable to snapshot artifact for cache");
                None
            }
        }
    }

    /// Returns true if `artifact` equals the last one recorded for
    /// `(kind, fabric)`. An absent entry is never equal.
    pub fn check<T: Serialize>(&self, kind: ArtifactKind, fabric: &str, artifact: &T) -> bool {
        let Some(value) = Self::snapshot(kind, fabric, artifact) else {
            return false;
        };
        let entries = self.entries.lock();
        entries
            .get(&(kind, fabric.to_string()))
            .is_some_and(|cached| *cached == value)
    }

    /// Records `artifact` as the last one pushed for `(kind, fabric)`.
    pub fn update<T: Serialize>(&self, kind: ArtifactKind, fabric: &str, artifact: &T) {
        if let Some(value) = Self::snapshot(kind, fabric, artifact) {
            self.entries.lock().insert((kind, fabric.to_string()), value);
        }
    }

    /// Drops the entry for `(kind, fabric)`.
    pub fn remove(&self, kind: ArtifactKind, fabric: &str) -> bool {
        self.entries
            .lock()
            .remove(&(kind, fabric.to_string()))
            .is_some()
    }

    /// Drops every entry, so the next push of each artifact goes through.
    pub fn invalidate(&self) {
        let mut entries = self.entries.lock();
        debug!(entries = entries.len(), "Invalidating push cache");
        entries.clear();
    }

    /// Number of cached artifacts.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
