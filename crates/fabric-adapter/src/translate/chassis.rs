//! Switch to Stratum chassis configuration.
//!
//! One chassis config is built per switch and pushed to the switch's own
//! device agent. Only a single line card is modelled: every port sits on
//! node 1, slot 1.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::TranslateError;
use crate::model::{Port, Speed, SwitchModel};
use crate::validate::{require_cage, unique_ports};

const GIG: u64 = 1_000_000_000;

/// Bit rate used for auto-negotiated ports until negotiation completes.
pub const AUTONEG_PLACEHOLDER_BPS: u64 = 10 * GIG;

/// Chassis platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    /// Generic Barefoot Tofino switch.
    #[serde(rename = "PLT_GENERIC_BAREFOOT_TOFINO")]
    GenericBarefootTofino,
}

impl Platform {
    fn as_str(&self) -> &'static str {
        match self {
            Platform::GenericBarefootTofino => "PLT_GENERIC_BAREFOOT_TOFINO",
        }
    }
}

/// Administrative state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdminState {
    /// Port is enabled.
    #[serde(rename = "ADMIN_STATE_ENABLED")]
    Enabled,
}

impl AdminState {
    fn as_str(&self) -> &'static str {
        match self {
            AdminState::Enabled => "ADMIN_STATE_ENABLED",
        }
    }
}

/// Protobuf tri-state boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriState {
    /// True.
    #[serde(rename = "TRI_STATE_TRUE")]
    True,
    /// False.
    #[serde(rename = "TRI_STATE_FALSE")]
    False,
}

impl TriState {
    fn as_str(&self) -> &'static str {
        match self {
            TriState::True => "TRI_STATE_TRUE",
            TriState::False => "TRI_STATE_FALSE",
        }
    }
}

/// Chassis section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chassis {
    /// Hardware platform.
    pub platform: Platform,
    /// Chassis name.
    pub name: String,
}

/// Line card node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Node ID.
    pub id: u64,
    /// Slot the node sits in.
    pub slot: i32,
    /// Node index.
    pub index: i32,
}

/// Per-port parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortConfigParams {
    /// Administrative state.
    pub admin_state: AdminState,
    /// Auto-negotiation.
    pub autoneg: TriState,
}

/// A physical port of the chassis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingletonPort {
    /// Port ID.
    pub id: u32,
    /// Port name.
    pub name: String,
    /// Line card slot.
    pub slot: i32,
    /// Front panel port (cage).
    pub port: i32,
    /// Breakout channel.
    pub channel: i32,
    /// Speed in bits per second.
    pub speed_bps: u64,
    /// Node the port belongs to.
    pub node: u64,
    /// Port parameters.
    pub config_params: PortConfigParams,
}

/// Stratum chassis configuration of one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChassisConfig {
    /// Description.
    pub description: String,
    /// Chassis section.
    pub chassis: Chassis,
    /// Line card nodes.
    pub nodes: Vec<Node>,
    /// Physical ports.
    pub singleton_ports: Vec<SingletonPort>,
}

/// Maps a link speed to bits per second and the auto-negotiation flag.
///
/// An absent speed maps to 0 bps without auto-negotiation.
pub fn speed_bps(speed: Option<Speed>) -> (u64, TriState) {
    let bps = match speed {
        None => 0,
        Some(Speed::Speed1G) => GIG,
        Some(Speed::Speed2_5G) => 2 * GIG + GIG / 2,
        Some(Speed::Speed5G) => 5 * GIG,
        Some(Speed::Speed10G) => 10 * GIG,
        Some(Speed::Speed25G) => 25 * GIG,
        Some(Speed::Speed40G) => 40 * GIG,
        Some(Speed::Speed100G) => 100 * GIG,
        Some(Speed::Speed400G) => 400 * GIG,
        Some(Speed::Autoneg) => return (AUTONEG_PLACEHOLDER_BPS, TriState::True),
    };
    (bps, TriState::False)
}

/// Builds the singleton port of one fabric port.
pub fn singleton_port(port: &Port) -> SingletonPort {
    let cage = u32::from(port.cage_number);
    let channel = u32::from(port.channel());

    let (id, name) = if channel == 0 {
        (cage, format!("Port {}/0", cage))
    } else {
        (cage * 100 + (channel - 1), format!("Port {}/{}", cage, channel - 1))
    };
    let (speed_bps, autoneg) = speed_bps(port.speed);

    SingletonPort {
        id,
        name,
        slot: 1,
        port: i32::from(port.cage_number),
        channel: i32::from(port.channel()),
        speed_bps,
        node: 1,
        config_params: PortConfigParams {
            admin_state: AdminState::Enabled,
            autoneg,
        },
    }
}

/// Result of translating one switch: the config and the ports that were
/// left out of it.
#[derive(Debug)]
pub struct ChassisTranslation {
    /// The chassis config.
    pub config: ChassisConfig,
    /// Per-port failures; those ports are absent from `config`.
    pub skipped: Vec<TranslateError>,
}

/// Builds the chassis config of a switch.
///
/// Ports whose cage is not in `model`, and ports repeating the cage and
/// channel of an earlier port, are skipped.
pub fn chassis_config(
    switch_id: &str,
    name: &str,
    ports: &[&Port],
    model: &SwitchModel,
) -> ChassisTranslation {
    let (ports, mut skipped) = unique_ports(switch_id, ports);
    let mut singleton_ports = Vec::with_capacity(ports.len());

    for port in ports {
        match require_cage(switch_id, model, port.cage_number) {
            Ok(()) => singleton_ports.push(singleton_port(port)),
            Err(e) => skipped.push(e),
        }
    }

    ChassisTranslation {
        config: ChassisConfig {
            description: name.to_string(),
            chassis: Chassis {
                platform: Platform::GenericBarefootTofino,
                name: name.to_string(),
            },
            nodes: vec![Node {
                id: 1,
                slot: 1,
                index: 1,
            }],
            singleton_ports,
        },
        skipped,
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < ' ' || c == '\x7f' => {
                let _ = write!(out, "\\{:03o}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl ChassisConfig {
    /// Renders the config in protobuf text format.
    ///
    /// As in proto3 text output, scalar fields at their default value are
    /// omitted.
    pub fn to_text_proto(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_text_proto(&mut out);
        out
    }

    fn write_text_proto(&self, out: &mut String) -> std::fmt::Result {
        if !self.description.is_empty() {
            writeln!(out, "description: {}", quote(&self.description))?;
        }

        writeln!(out, "chassis {{")?;
        writeln!(out, "  platform: {}", self.chassis.platform.as_str())?;
        if !self.chassis.name.is_empty() {
            writeln!(out, "  name: {}", quote(&self.chassis.name))?;
        }
        writeln!(out, "}}")?;

        for node in &self.nodes {
            writeln!(out, "nodes {{")?;
            writeln!(out, "  id: {}", node.id)?;
            writeln!(out, "  slot: {}", node.slot)?;
            writeln!(out, "  index: {}", node.index)?;
            writeln!(out, "}}")?;
        }

        for port in &self.singleton_ports {
            writeln!(out, "singleton_ports {{")?;
            writeln!(out, "  id: {}", port.id)?;
            writeln!(out, "  name: {}", quote(&port.name))?;
            writeln!(out, "  slot: {}", port.slot)?;
            writeln!(out, "  port: {}", port.port)?;
            if port.channel != 0 {
                writeln!(out, "  channel: {}", port.channel)?;
            }
            if port.speed_bps != 0 {
                writeln!(out, "  speed_bps: {}", port.speed_bps)?;
            }
            writeln!(out, "  config_params {{")?;
            writeln!(
                out,
                "    admin_state: {}",
                port.config_params.admin_state.as_str()
            )?;
            writeln!(out, "    autoneg: {}", port.config_params.autoneg.as_str())?;
            writeln!(out, "  }}")?;
            writeln!(out, "  node: {}", port.node)?;
            writeln!(out, "}}")?;
        }

        Ok(())
    }
}
