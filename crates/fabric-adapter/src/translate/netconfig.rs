//! Fabric to ONOS network configuration.
//!
//! The document mirrors the ONOS `network/configuration` REST schema. All of
//! its maps are ordered, so the serialized bytes depend only on content.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::TranslateError;
use crate::model::{cage_channel_to_port, Port, Role, Switch, SwitchModel};
use crate::validate::{require_cage, validate_route, ValidatedSwitch};

/// Application key of the static route list.
pub const ROUTE_APP_NAME: &str = "org.onosproject.routeservice";

/// Path of the netconfig REST resource, relative to the controller URI.
pub const NETCONFIG_PATH: &str = "onos/v1/network/configuration";

/// ONOS network configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    /// Device records keyed by `device:<switch>`.
    pub devices: BTreeMap<String, OnosDevice>,
    /// Port records keyed by `device:<switch>/<port>`.
    pub ports: BTreeMap<String, OnosPort>,
    /// Application configs keyed by application name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub apps: BTreeMap<String, OnosApp>,
}

impl NetConfig {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route to the shared route application.
    pub fn add_route(&mut self, route: OnosRoute) {
        self.apps
            .entry(ROUTE_APP_NAME.to_string())
            .or_default()
            .routes
            .push(route);
    }

    /// Pretty-printed JSON body.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Device record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnosDevice {
    /// Basic device attributes.
    pub basic: DeviceBasic,
    /// Segment routing attributes.
    pub segmentrouting: SegmentRouting,
}

/// `basic` section of a device record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBasic {
    /// Display name.
    pub name: String,
    /// `grpc://` URI of the device agent.
    pub management_address: String,
    /// ONOS driver.
    pub driver: String,
    /// ONOS pipeconf.
    pub pipeconf: String,
}

/// `segmentrouting` section of a device record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRouting {
    /// Node SID.
    pub ipv4_node_sid: u32,
    /// Loopback address.
    pub ipv4_loopback: String,
    /// Router MAC derived from the loopback.
    pub router_mac: String,
    /// True unless the switch is a spine.
    pub is_edge_router: bool,
    /// Adjacency SIDs (always empty).
    pub adjacency_sids: Vec<u16>,
    /// Paired device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_device_id: Option<String>,
    /// Local port towards the paired device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_local_port: Option<u16>,
}

/// Port record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnosPort {
    /// Interfaces on the port (one per port here).
    pub interfaces: Vec<OnosInterface>,
}

/// Interface of a port record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnosInterface {
    /// Interface name.
    pub name: String,
    /// Subnets of every VLAN on the interface.
    pub ips: Vec<String>,
    /// Untagged VLAN.
    #[serde(
        rename = "vlan-untagged",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vlan_untagged: Option<u16>,
    /// Tagged VLANs.
    #[serde(rename = "vlan-tagged", default, skip_serializing_if = "Vec::is_empty")]
    pub vlan_tagged: Vec<u16>,
}

/// Application config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnosApp {
    /// Static routes.
    pub routes: Vec<OnosRoute>,
}

/// Static route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnosRoute {
    /// Destination prefix.
    pub prefix: String,
    /// Next hop.
    pub next_hop: String,
}

/// Key of a device record.
pub fn device_key(switch_id: &str) -> String {
    format!("device:{}", switch_id)
}

/// Key of a port record.
pub fn port_key(switch_id: &str, port: &Port) -> String {
    format!("device:{}/{}", switch_id, port.onos_number())
}

/// Derives a router MAC from an IP address: two zero octets followed by the
/// last four octets of the address.
pub fn address_to_mac(address: &str) -> Result<String, TranslateError> {
    let ip: IpAddr = address.parse().map_err(|_| TranslateError::InvalidAddress {
        address: address.to_string(),
    })?;
    let tail = match ip {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(v6) => {
            let o = v6.octets();
            [o[12], o[13], o[14], o[15]]
        }
    };
    Ok(format!(
        "00:00:{:02X}:{:02X}:{:02X}:{:02X}",
        tail[0], tail[1], tail[2], tail[3]
    ))
}

/// Builds the device record of a validated switch.
///
/// `sid` comes from the SID store and `loopback` from the placeholder pool;
/// everything else is derived from the switch.
pub fn device_record(
    sw: &ValidatedSwitch<'_>,
    sid: u32,
    loopback: &str,
) -> Result<OnosDevice, TranslateError> {
    let router_mac = address_to_mac(loopback)?;

    let mut segmentrouting = SegmentRouting {
        ipv4_node_sid: sid,
        ipv4_loopback: loopback.to_string(),
        router_mac,
        is_edge_router: sw.switch.role != Role::Spine,
        adjacency_sids: Vec::new(),
        pair_device_id: None,
        pair_local_port: None,
    };

    if let Some((paired, local_port)) = pairing(sw.id, sw.switch) {
        segmentrouting.pair_device_id = Some(device_key(paired));
        segmentrouting.pair_local_port = Some(local_port);
    }

    Ok(OnosDevice {
        basic: DeviceBasic {
            name: sw.name().to_string(),
            management_address: sw.management.grpc_uri(),
            driver: sw.driver.to_string(),
            pipeconf: sw.pipeconf.to_string(),
        },
        segmentrouting,
    })
}

/// Paired switch and local pairing port, when exactly one pairing port is
/// configured.
fn pairing<'a>(id: &str, switch: &'a Switch) -> Option<(&'a str, u16)> {
    let pair = switch.switch_pair.as_ref()?;
    let paired = pair.paired_switch.as_deref()?;

    match pair.pairing_ports.as_slice() {
        [] => {
            tracing::warn!(switch = id, "Switch has PairedSwitch but no PairingPorts");
            None
        }
        [port] => Some((
            paired,
            cage_channel_to_port(port.cage_number, port.channel_number.unwrap_or(0)),
        )),
        _ => {
            tracing::warn!(
                switch = id,
                count = pair.pairing_ports.len(),
                "Switch has PairedSwitch and more than one PairingPort"
            );
            None
        }
    }
}

/// Builds the port record of one port.
///
/// Fails when the cage is not in the switch model or when a VLAN the port
/// references is not defined on the switch.
pub fn port_record(
    switch_id: &str,
    switch: &Switch,
    model: &SwitchModel,
    port: &Port,
) -> Result<(String, OnosPort), TranslateError> {
    require_cage(switch_id, model, port.cage_number)?;

    let mut iface = OnosInterface {
        name: port
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{}/{}", port.cage_number, port.channel())),
        ..Default::default()
    };

    if let Some(vlans) = &port.vlans {
        let lookup = |vlan: u16| {
            switch
                .vlans
                .get(&vlan)
                .ok_or_else(|| TranslateError::VlanNotFound {
                    switch: switch_id.to_string(),
                    vlan,
                })
        };

        if let Some(untagged) = vlans.untagged {
            let vlan = lookup(untagged)?;
            iface.vlan_untagged = Some(untagged);
            iface.ips.extend(vlan.subnets.iter().cloned());
        }
        for &tagged in &vlans.tagged {
            let vlan = lookup(tagged)?;
            iface.vlan_tagged.push(tagged);
            iface.ips.extend(vlan.subnets.iter().cloned());
        }
    }

    Ok((
        port_key(switch_id, port),
        OnosPort {
            interfaces: vec![iface],
        },
    ))
}

/// Builds the route record of a static route.
pub fn route_record(route_id: &str, route: &crate::model::Route) -> Result<OnosRoute, TranslateError> {
    let (prefix, next_hop) = validate_route(route_id, route)?;
    Ok(OnosRoute {
        prefix: prefix.to_string(),
        next_hop: next_hop.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Management, PortRef, PortVlans, SwitchPair, Vlan};
    use crate::validate::validate_switch;
    use pretty_assertions::assert_eq;

    fn leaf() -> Switch {
        Switch {
            display_name: Some("Leaf 1".to_string()),
            model_id: Some("test".to_string()),
            role: Role::Leaf,
            management: Some(Management {
                address: Some("11.22.33.44".to_string()),
                port_number: Some(2345),
            }),
            attributes: BTreeMap::from([
                ("driver".to_string(), "test-driver".to_string()),
                ("pipeconf".to_string(), "pipe.configuration".to_string()),
            ]),
            ports: vec![Port {
                cage_number: 2,
                channel_number: Some(2),
                display_name: Some("Port 1".to_string()),
                vlans: Some(PortVlans {
                    untagged: Some(55),
                    tagged: vec![44],
                }),
                ..Default::default()
            }],
            vlans: BTreeMap::from([
                (
                    44,
                    Vlan {
                        subnets: vec!["11.22.33.44/24".to_string()],
                        ..Default::default()
                    },
                ),
                (
                    55,
                    Vlan {
                        subnets: vec!["11.22.33.55/24".to_string()],
                        ..Default::default()
                    },
                ),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_address_to_mac() {
        assert_eq!(address_to_mac("11.22.33.44").unwrap(), "00:00:0B:16:21:2C");
        assert_eq!(address_to_mac("192.168.55.1").unwrap(), "00:00:C0:A8:37:01");
        assert_eq!(address_to_mac("::ffff:10.0.0.1").unwrap(), "00:00:0A:00:00:01");
        assert!(address_to_mac("leaf1.local").is_err());
    }

    #[test]
    fn test_device_record() {
        let sw = leaf();
        let valid = validate_switch("fabric-one", "leaf-one", &sw).unwrap();
        let device = device_record(&valid, 100, "11.22.33.44").unwrap();

        assert_eq!(device.basic.name, "Leaf 1");
        assert_eq!(device.basic.driver, "test-driver");
        assert_eq!(device.basic.pipeconf, "pipe.configuration");
        assert_eq!(
            device.basic.management_address,
            "grpc://11.22.33.44:2345?device_id=1"
        );
        assert_eq!(device.segmentrouting.ipv4_node_sid, 100);
        assert_eq!(device.segmentrouting.ipv4_loopback, "11.22.33.44");
        assert_eq!(device.segmentrouting.router_mac, "00:00:0B:16:21:2C");
        assert!(device.segmentrouting.is_edge_router);
        assert!(device.segmentrouting.adjacency_sids.is_empty());
        assert_eq!(device.segmentrouting.pair_device_id, None);
    }

    #[test]
    fn test_spine_is_not_edge_router() {
        let mut sw = leaf();
        sw.role = Role::Spine;
        let valid = validate_switch("fabric-one", "spine-one", &sw).unwrap();
        let device = device_record(&valid, 101, "11.22.33.45").unwrap();
        assert!(!device.segmentrouting.is_edge_router);

        sw.role = Role::Unset;
        let valid = validate_switch("fabric-one", "other", &sw).unwrap();
        assert!(device_record(&valid, 102, "11.22.33.46")
            .unwrap()
            .segmentrouting
            .is_edge_router);
    }

    #[test]
    fn test_pairing() {
        let mut sw = leaf();
        sw.switch_pair = Some(SwitchPair {
            paired_switch: Some("leaf-two".to_string()),
            pairing_ports: vec![PortRef {
                cage_number: 3,
                channel_number: Some(1),
            }],
        });
        let valid = validate_switch("fabric-one", "leaf-one", &sw).unwrap();
        let device = device_record(&valid, 100, "11.22.33.44").unwrap();
        assert_eq!(
            device.segmentrouting.pair_device_id.as_deref(),
            Some("device:leaf-two")
        );
        assert_eq!(device.segmentrouting.pair_local_port, Some(103));

        // More than one pairing port is unsupported and omitted.
        sw.switch_pair.as_mut().unwrap().pairing_ports.push(PortRef {
            cage_number: 4,
            channel_number: None,
        });
        let valid = validate_switch("fabric-one", "leaf-one", &sw).unwrap();
        let device = device_record(&valid, 100, "11.22.33.44").unwrap();
        assert_eq!(device.segmentrouting.pair_device_id, None);
        assert_eq!(device.segmentrouting.pair_local_port, None);
    }

    #[test]
    fn test_port_record_with_vlans() {
        let sw = leaf();
        let model = SwitchModel::with_cages(16);
        let (key, port) = port_record("leaf-one", &sw, &model, &sw.ports[0]).unwrap();

        assert_eq!(key, "device:leaf-one/202");
        assert_eq!(port.interfaces.len(), 1);
        let iface = &port.interfaces[0];
        assert_eq!(iface.name, "Port 1");
        assert_eq!(iface.vlan_untagged, Some(55));
        assert_eq!(iface.vlan_tagged, vec![44]);
        assert_eq!(
            iface.ips,
            vec!["11.22.33.55/24".to_string(), "11.22.33.44/24".to_string()]
        );
    }

    #[test]
    fn test_port_record_errors() {
        let mut sw = leaf();
        let model = SwitchModel::with_cages(1);
        assert!(matches!(
            port_record("leaf-one", &sw, &model, &sw.ports[0]),
            Err(TranslateError::CageNotInModel { cage: 2, .. })
        ));

        sw.vlans.remove(&44);
        let model = SwitchModel::with_cages(16);
        assert!(matches!(
            port_record("leaf-one", &sw, &model, &sw.ports[0]),
            Err(TranslateError::VlanNotFound { vlan: 44, .. })
        ));
    }

    #[test]
    fn test_interface_json_shape() {
        let sw = leaf();
        let model = SwitchModel::with_cages(16);
        let (_, port) = port_record("leaf-one", &sw, &model, &sw.ports[0]).unwrap();
        let json = serde_json::to_value(&port).unwrap();
        assert_eq!(json["interfaces"][0]["vlan-untagged"], 55);
        assert_eq!(json["interfaces"][0]["vlan-tagged"][0], 44);
    }

    #[test]
    fn test_routes_share_one_app() {
        let mut doc = NetConfig::new();
        let route = |prefix: &str| crate::model::Route {
            prefix: Some(prefix.to_string()),
            address: Some("10.0.0.1".to_string()),
            description: None,
        };
        doc.add_route(route_record("a", &route("10.1.0.0/16")).unwrap());
        doc.add_route(route_record("b", &route("10.2.0.0/16")).unwrap());

        assert_eq!(doc.apps.len(), 1);
        assert_eq!(doc.apps[ROUTE_APP_NAME].routes.len(), 2);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json["apps"][ROUTE_APP_NAME]["routes"][1]["nextHop"],
            "10.0.0.1"
        );

        assert!(route_record("c", &crate::model::Route::default()).is_err());
    }
}
