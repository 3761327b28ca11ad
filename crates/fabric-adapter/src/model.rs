//! Desired-state model of an SDN fabric.
//!
//! The configuration service hands the adapter a [`ConfigForest`]: one
//! [`RootDevice`] tree per fabric. The tree is already parsed; this module
//! only gives it types. Fields that the upstream schema makes optional stay
//! `Option` here, and the policy for each absent field lives in
//! [`crate::validate`] and the translators.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Fabric identifier (the key of a fabric in the forest).
pub type FabricId = String;

/// The desired state of every fabric managed by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigForest {
    /// Fabric trees keyed by fabric ID.
    #[serde(default)]
    pub configs: BTreeMap<FabricId, RootDevice>,
}

impl ConfigForest {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a fabric.
    pub fn with_fabric(mut self, id: impl Into<FabricId>, fabric: RootDevice) -> Self {
        self.configs.insert(id.into(), fabric);
        self
    }
}

/// One fabric's configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RootDevice {
    /// Switches keyed by switch ID.
    #[serde(default, rename = "switch")]
    pub switches: BTreeMap<String, Switch>,
    /// Hardware models keyed by model ID.
    #[serde(default, rename = "switch-model")]
    pub switch_models: BTreeMap<String, SwitchModel>,
    /// Static routes keyed by route ID.
    #[serde(default, rename = "route")]
    pub routes: BTreeMap<String, Route>,
}

/// Role of a switch in the leaf/spine topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Leaf (edge) switch.
    Leaf,
    /// Spine switch.
    Spine,
    /// Role not set.
    #[default]
    Unset,
    /// Explicitly undefined role.
    Undefined,
}

/// Management endpoint of a switch's device agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Management {
    /// Address (IP literal or hostname).
    pub address: Option<String>,
    /// gRPC port of the device agent.
    pub port_number: Option<u16>,
}

/// A fabric switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Switch {
    /// Human readable name; the switch ID is used when absent.
    pub display_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Hardware model of the switch.
    pub model_id: Option<String>,
    /// Topology role.
    #[serde(default)]
    pub role: Role,
    /// Device agent endpoint.
    pub management: Option<Management>,
    /// Free-form attributes; `driver` and `pipeconf` are required.
    #[serde(default, rename = "attribute")]
    pub attributes: BTreeMap<String, String>,
    /// Physical ports.
    #[serde(default, rename = "port")]
    pub ports: Vec<Port>,
    /// VLANs keyed by VLAN ID.
    #[serde(default, rename = "vlan")]
    pub vlans: BTreeMap<u16, Vlan>,
    /// Pairing with another switch.
    pub switch_pair: Option<SwitchPair>,
}

impl Switch {
    /// Name to show downstream, falling back to `id`.
    pub fn name_or<'a>(&'a self, id: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(id)
    }

    /// Ports in `(cage, channel)` order.
    pub fn sorted_ports(&self) -> Vec<&Port> {
        let mut ports: Vec<&Port> = self.ports.iter().collect();
        ports.sort_by_key(|p| (p.cage_number, p.channel()));
        ports
    }
}

/// Link speed of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speed {
    /// 1 Gb/s.
    #[serde(rename = "speed-1g", alias = "1g")]
    Speed1G,
    /// 2.5 Gb/s.
    #[serde(rename = "speed-2.5g", alias = "2.5g")]
    Speed2_5G,
    /// 5 Gb/s.
    #[serde(rename = "speed-5g", alias = "5g")]
    Speed5G,
    /// 10 Gb/s.
    #[serde(rename = "speed-10g", alias = "10g")]
    Speed10G,
    /// 25 Gb/s.
    #[serde(rename = "speed-25g", alias = "25g")]
    Speed25G,
    /// 40 Gb/s.
    #[serde(rename = "speed-40g", alias = "40g")]
    Speed40G,
    /// 100 Gb/s.
    #[serde(rename = "speed-100g", alias = "100g")]
    Speed100G,
    /// 400 Gb/s.
    #[serde(rename = "speed-400g", alias = "400g")]
    Speed400G,
    /// Auto-negotiated.
    #[serde(rename = "speed-autoneg", alias = "autoneg")]
    Autoneg,
}

/// A physical port, addressed by cage and channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Port {
    /// Cage (physical connector) number.
    pub cage_number: u8,
    /// Breakout channel; absent means channel 0.
    pub channel_number: Option<u8>,
    /// Human readable name.
    pub display_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Configured link speed.
    pub speed: Option<Speed>,
    /// VLAN membership.
    pub vlans: Option<PortVlans>,
}

impl Port {
    /// Channel number, 0 when absent.
    pub fn channel(&self) -> u8 {
        self.channel_number.unwrap_or(0)
    }

    /// Port number used by ONOS: `channel * 100 + cage`.
    pub fn onos_number(&self) -> u16 {
        cage_channel_to_port(self.cage_number, self.channel())
    }
}

/// Combines a cage and channel into the ONOS port number.
pub fn cage_channel_to_port(cage: u8, channel: u8) -> u16 {
    u16::from(channel) * 100 + u16::from(cage)
}

/// VLAN membership of a port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortVlans {
    /// The untagged VLAN.
    pub untagged: Option<u16>,
    /// Tagged VLANs.
    #[serde(default)]
    pub tagged: Vec<u16>,
}

/// A VLAN defined on a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Vlan {
    /// Human readable name.
    pub display_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// IP subnets served on the VLAN.
    #[serde(default, rename = "subnet")]
    pub subnets: Vec<String>,
}

/// Reference to a port of a switch, used by pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortRef {
    /// Cage number.
    pub cage_number: u8,
    /// Channel number; absent means channel 0.
    pub channel_number: Option<u8>,
}

/// Pairing of a switch with a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchPair {
    /// ID of the paired switch.
    pub paired_switch: Option<String>,
    /// Local ports connecting the pair.
    #[serde(default, rename = "pairing-port")]
    pub pairing_ports: Vec<PortRef>,
}

/// A port slot of a hardware model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelPort {
    /// Human readable name.
    pub display_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Catalog of a hardware model's cages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchModel {
    /// Human readable name.
    pub display_name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Supported cages keyed by cage number.
    #[serde(default, rename = "port")]
    pub ports: BTreeMap<u8, ModelPort>,
}

impl SwitchModel {
    /// A model supporting cages `1..=cages`.
    pub fn with_cages(cages: u8) -> Self {
        Self {
            ports: (1..=cages).map(|c| (c, ModelPort::default())).collect(),
            ..Default::default()
        }
    }
}

/// A static route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Route {
    /// Destination prefix.
    pub prefix: Option<String>,
    /// Next-hop address.
    pub address: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Kind of configuration callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// New desired state was applied.
    Applied,
    /// Part of the desired state was deleted.
    Deleted,
    /// Resynchronization requested by an operator.
    Forced,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::Applied => "applied",
            UpdateKind::Deleted => "deleted",
            UpdateKind::Forced => "forced",
        };
        f.write_str(name)
    }
}

/// A queued unit of synchronization work.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    /// Desired-state snapshot.
    pub config: Arc<ConfigForest>,
    /// Callback kind that produced the update.
    pub kind: UpdateKind,
    /// Target name from the callback.
    pub target: String,
}

impl ConfigUpdate {
    /// Creates an update.
    pub fn new(config: Arc<ConfigForest>, kind: UpdateKind, target: impl Into<String>) -> Self {
        Self {
            config,
            kind,
            target: target.into(),
        }
    }
}

/// Schema metadata advertised to the configuration service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCatalog {
    /// Models served by the adapter.
    pub models: Vec<ModelData>,
}

/// One served model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelData {
    /// Model name.
    pub name: String,
    /// Publishing organization.
    pub organization: String,
    /// Model version.
    pub version: String,
}

impl ModelCatalog {
    /// The sdn-fabric model family.
    pub fn sdn_fabric() -> Self {
        Self {
            models: vec![ModelData {
                name: "sdn-fabric".to_string(),
                organization: "Open Networking Foundation".to_string(),
                version: "0.1.x".to_string(),
            }],
        }
    }

    /// `name,organization,version` strings, one per model.
    pub fn supported_models(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|m| format!("{},{},{}", m.name, m.organization, m.version))
            .collect()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::sdn_fabric()
    }
}
