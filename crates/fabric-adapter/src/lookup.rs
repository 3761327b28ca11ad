//! Resolution of a fabric to its ONOS controller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::translate::NETCONFIG_PATH;

/// Controller endpoint and credentials of a fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Controller host.
    pub address: String,
    /// Controller REST port.
    pub port: u16,
    /// REST username.
    #[serde(default)]
    pub username: String,
    /// REST password.
    #[serde(default)]
    pub password: String,
}

impl ControllerInfo {
    /// Creates controller info.
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Base URI of the controller, with a trailing slash.
    pub fn base_uri(&self) -> String {
        format!("http://{}:{}/", self.address, self.port)
    }

    /// URI of the netconfig resource.
    pub fn netconfig_url(&self) -> String {
        format!("{}{}", self.base_uri(), NETCONFIG_PATH)
    }
}

/// Resolves fabrics to controllers.
#[async_trait]
pub trait ControllerLookup: Send + Sync {
    /// Returns the controller of `fabric`.
    async fn lookup(&self, fabric: &str) -> Result<ControllerInfo, LookupError>;
}

/// Lookup backed by a fixed table, typically the `[fabrics]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    fabrics: BTreeMap<String, ControllerInfo>,
}

impl StaticLookup {
    /// Creates a lookup over `fabrics`.
    pub fn new(fabrics: BTreeMap<String, ControllerInfo>) -> Self {
        Self { fabrics }
    }

    /// Adds or replaces one fabric.
    pub fn with_fabric(mut self, fabric: impl Into<String>, info: ControllerInfo) -> Self {
        self.fabrics.insert(fabric.into(), info);
        self
    }
}

#[async_trait]
impl ControllerLookup for StaticLookup {
    async fn lookup(&self, fabric: &str) -> Result<ControllerInfo, LookupError> {
        self.fabrics
            .get(fabric)
            .cloned()
            .ok_or_else(|| LookupError::UnknownFabric {
                fabric: fabric.to_string(),
            })
    }
}
