//! Error types for the fabric adapter.
//!
//! Errors are split by how far they propagate:
//!
//! - [`TranslateError`] aborts a single switch, port or route; the caller
//!   logs it and moves on to the next sibling.
//! - [`PushError`] is a failed delivery to ONOS or Stratum; the engine counts
//!   it and retries the whole update.
//! - [`SyncError`] crosses the engine boundary (fatal-to-fabric conditions
//!   and synchronous delete failures).

use std::fmt;
use std::io;
use std::path::PathBuf;

use fabric_sid_store::SidStoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failure translating one entity of a fabric.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The switch has no management address or port.
    #[error("Fabric {fabric} switch {switch} has no management address")]
    MissingManagement {
        /// Fabric being translated.
        fabric: String,
        /// The switch.
        switch: String,
    },

    /// A required attribute is missing or empty.
    #[error("Switch {switch} {attribute} attribute must be specified")]
    MissingAttribute {
        /// The switch.
        switch: String,
        /// Attribute key (e.g., "driver").
        attribute: String,
    },

    /// The switch does not name a model.
    #[error("Switch {switch} SwitchModel id is blank")]
    BlankModelId {
        /// The switch.
        switch: String,
    },

    /// The switch names a model the fabric does not define.
    #[error("Switch {switch} SwitchModel {model} not found")]
    ModelNotFound {
        /// The switch.
        switch: String,
        /// The missing model ID.
        model: String,
    },

    /// The port's cage is not part of the switch model.
    #[error("Switch {switch} SwitchModel has no port matching cage {cage}")]
    CageNotInModel {
        /// The switch.
        switch: String,
        /// The cage number.
        cage: u8,
    },

    /// Another port of the switch already has this cage and channel.
    #[error("Switch {switch} has more than one port at cage {cage} channel {channel}")]
    DuplicatePort {
        /// The switch.
        switch: String,
        /// The cage number.
        cage: u8,
        /// The channel number (0 when absent).
        channel: u8,
    },

    /// A port references a VLAN the switch does not define.
    #[error("Switch {switch} Vlan {vlan} not found")]
    VlanNotFound {
        /// The switch.
        switch: String,
        /// The VLAN ID.
        vlan: u16,
    },

    /// A router MAC could not be derived from the loopback address.
    #[error("{address} is not a valid IP address")]
    InvalidAddress {
        /// The offending address.
        address: String,
    },

    /// Every placeholder loopback address is taken.
    #[error("No placeholder loopback address left for management address {address}")]
    PlaceholderExhausted {
        /// Management address that needed a placeholder.
        address: String,
    },

    /// The route is missing its prefix or next hop.
    #[error("Route {route} {message}")]
    InvalidRoute {
        /// Route ID.
        route: String,
        /// What is wrong with it.
        message: String,
    },

    /// SID allocation failed.
    #[error("Fabric {fabric} switch {switch} unable to create SID: {source}")]
    Sid {
        /// Fabric being translated.
        fabric: String,
        /// The switch.
        switch: String,
        /// The store failure.
        #[source]
        source: SidStoreError,
    },
}

impl TranslateError {
    /// Creates a missing attribute error.
    pub fn missing_attribute(switch: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            switch: switch.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an invalid route error.
    pub fn invalid_route(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Returns true if the entity may translate on a later attempt without
    /// any configuration change.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Sid { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// The downstream operation a push performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushOperation {
    /// REST POST of a netconfig document.
    Post,
    /// REST DELETE of a netconfig document.
    Delete,
    /// gNMI Set of a chassis config.
    Set,
}

impl PushOperation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PushOperation::Post => "POST",
            PushOperation::Delete => "DELETE",
            PushOperation::Set => "SET",
        }
    }
}

impl fmt::Display for PushOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed delivery to a downstream endpoint.
///
/// `status_code` carries the HTTP status when the endpoint answered; it is
/// `None` when the request never got an answer (connection refused, timeout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Push {operation} to {endpoint} failed: {status}")]
pub struct PushError {
    /// Endpoint the push was sent to.
    pub endpoint: String,
    /// Operation that failed.
    pub operation: PushOperation,
    /// Status code returned by the endpoint, if any.
    pub status_code: Option<u16>,
    /// Status line or transport message.
    pub status: String,
}

impl PushError {
    /// Creates a push error.
    pub fn new(
        endpoint: impl Into<String>,
        operation: PushOperation,
        status_code: Option<u16>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            operation,
            status_code,
            status: status.into(),
        }
    }
}

/// Failure resolving a fabric to its controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No controller is known for the fabric.
    #[error("Fabric {fabric} has no controller endpoint")]
    UnknownFabric {
        /// The fabric.
        fabric: String,
    },
}

/// Errors that cross the engine boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The fabric's controller could not be resolved.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// The netconfig document could not be serialized.
    #[error("Fabric {fabric} failed to marshal netconfig JSON: {source}")]
    Serialize {
        /// The fabric.
        fabric: String,
        /// The serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// A push failed.
    #[error(transparent)]
    Push(#[from] PushError),

    /// A synchronous delete could not be fully applied.
    #[error("Delete on target {target} failed with {failures} push failure(s)")]
    DeleteFailed {
        /// The delete target.
        target: String,
        /// Number of pushes that failed.
        failures: usize,
    },

    /// The SID store failed.
    #[error(transparent)]
    SidStore(#[from] SidStoreError),

    /// The synchronizer was shut down.
    #[error("Synchronizer is shut down")]
    Shutdown,
}

impl SyncError {
    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Push(_) | SyncError::DeleteFailed { .. } => true,
            SyncError::SidStore(e) => e.is_retryable(),
            SyncError::Lookup(_) | SyncError::Serialize { .. } | SyncError::Shutdown => false,
        }
    }
}

/// Failure loading the adapter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// The config file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for the config schema.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_error_display() {
        let err = PushError::new(
            "http://onos:8181/onos/v1/network/configuration",
            PushOperation::Post,
            Some(403),
            "403 Forbidden",
        );
        assert_eq!(
            err.to_string(),
            "Push POST to http://onos:8181/onos/v1/network/configuration failed: 403 Forbidden"
        );
        assert_eq!(err.operation.as_str(), "POST");
    }

    #[test]
    fn test_translate_error_display() {
        let err = TranslateError::missing_attribute("leaf-one", "driver");
        assert_eq!(
            err.to_string(),
            "Switch leaf-one driver attribute must be specified"
        );

        let err = TranslateError::CageNotInModel {
            switch: "leaf-one".to_string(),
            cage: 33,
        };
        assert_eq!(
            err.to_string(),
            "Switch leaf-one SwitchModel has no port matching cage 33"
        );
    }

    #[test]
    fn test_sync_error_is_retryable() {
        let push = PushError::new("x", PushOperation::Set, Some(500), "boom");
        assert!(SyncError::from(push).is_retryable());
        assert!(SyncError::SidStore(SidStoreError::backend("incr", "timeout")).is_retryable());
        assert!(!SyncError::SidStore(SidStoreError::Closed).is_retryable());
        assert!(!SyncError::from(LookupError::UnknownFabric {
            fabric: "f".to_string()
        })
        .is_retryable());
    }

    #[test]
    fn test_translate_error_retryable_only_for_transient_sid_failures() {
        let err = TranslateError::Sid {
            fabric: "fabric-one".to_string(),
            switch: "leaf-one".to_string(),
            source: SidStoreError::backend("increment", "connection reset"),
        };
        assert!(err.is_retryable());
        assert!(!TranslateError::missing_attribute("s", "pipeconf").is_retryable());
    }
}
