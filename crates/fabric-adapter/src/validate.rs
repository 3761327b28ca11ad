//! Boundary checks run before translation.
//!
//! Every "absent means error" rule of the fabric model is enforced here, so
//! the translators work on values that are known to be present.

use std::collections::BTreeSet;

use crate::error::TranslateError;
use crate::model::{Port, Route, RootDevice, Switch, SwitchModel};

/// Attribute naming the ONOS driver of a switch.
pub const DRIVER_ATTRIBUTE: &str = "driver";

/// Attribute naming the ONOS pipeconf of a switch.
pub const PIPECONF_ATTRIBUTE: &str = "pipeconf";

/// Management endpoint of a switch, both halves present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagementEndpoint<'a> {
    /// Address (IP literal or hostname).
    pub address: &'a str,
    /// Device agent port.
    pub port: u16,
}

impl ManagementEndpoint<'_> {
    /// ONOS management address of the device agent.
    pub fn grpc_uri(&self) -> String {
        format!("grpc://{}:{}?device_id=1", self.address, self.port)
    }

    /// URI the chassis config is pushed to.
    pub fn agent_uri(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// A switch that has everything the controller translation needs.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedSwitch<'a> {
    /// Switch ID.
    pub id: &'a str,
    /// The switch itself.
    pub switch: &'a Switch,
    /// Management endpoint.
    pub management: ManagementEndpoint<'a>,
    /// ONOS driver.
    pub driver: &'a str,
    /// ONOS pipeconf.
    pub pipeconf: &'a str,
}

impl<'a> ValidatedSwitch<'a> {
    /// Name to show downstream.
    pub fn name(&self) -> &'a str {
        self.switch.name_or(self.id)
    }
}

/// Requires the management address and port of a switch.
pub fn require_management<'a>(
    fabric: &str,
    id: &str,
    switch: &'a Switch,
) -> Result<ManagementEndpoint<'a>, TranslateError> {
    let missing = || TranslateError::MissingManagement {
        fabric: fabric.to_string(),
        switch: id.to_string(),
    };

    let management = switch.management.as_ref().ok_or_else(missing)?;
    let address = management
        .address
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(missing)?;
    let port = management.port_number.ok_or_else(missing)?;

    Ok(ManagementEndpoint { address, port })
}

fn require_attribute<'a>(id: &str, switch: &'a Switch, key: &str) -> Result<&'a str, TranslateError> {
    switch
        .attributes
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TranslateError::missing_attribute(id, key))
}

/// Validates a switch for controller translation.
pub fn validate_switch<'a>(
    fabric: &str,
    id: &'a str,
    switch: &'a Switch,
) -> Result<ValidatedSwitch<'a>, TranslateError> {
    let management = require_management(fabric, id, switch)?;
    let driver = require_attribute(id, switch, DRIVER_ATTRIBUTE)?;
    let pipeconf = require_attribute(id, switch, PIPECONF_ATTRIBUTE)?;

    Ok(ValidatedSwitch {
        id,
        switch,
        management,
        driver,
        pipeconf,
    })
}

/// Resolves the hardware model of a switch.
pub fn lookup_model<'a>(
    fabric: &'a RootDevice,
    id: &str,
    switch: &Switch,
) -> Result<&'a SwitchModel, TranslateError> {
    let model_id = switch
        .model_id
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| TranslateError::BlankModelId {
            switch: id.to_string(),
        })?;

    fabric
        .switch_models
        .get(model_id)
        .ok_or_else(|| TranslateError::ModelNotFound {
            switch: id.to_string(),
            model: model_id.to_string(),
        })
}

/// Requires a cage to be part of the switch model.
pub fn require_cage(id: &str, model: &SwitchModel, cage: u8) -> Result<(), TranslateError> {
    if model.ports.contains_key(&cage) {
        Ok(())
    } else {
        Err(TranslateError::CageNotInModel {
            switch: id.to_string(),
            cage,
        })
    }
}

/// Keeps the first port for each `(cage, channel)`; an absent channel is
/// channel 0. Every later port with a key already taken is returned as an
/// error instead.
pub fn unique_ports<'a>(id: &str, ports: &[&'a Port]) -> (Vec<&'a Port>, Vec<TranslateError>) {
    let mut seen = BTreeSet::new();
    let mut kept = Vec::with_capacity(ports.len());
    let mut duplicates = Vec::new();

    for &port in ports {
        if seen.insert((port.cage_number, port.channel())) {
            kept.push(port);
        } else {
            duplicates.push(TranslateError::DuplicatePort {
                switch: id.to_string(),
                cage: port.cage_number,
                channel: port.channel(),
            });
        }
    }
    (kept, duplicates)
}

/// Requires both the prefix and next hop of a route.
pub fn validate_route<'a>(id: &str, route: &'a Route) -> Result<(&'a str, &'a str), TranslateError> {
    let prefix = route
        .prefix
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| TranslateError::invalid_route(id, "has no prefix"))?;
    let address = route
        .address
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| TranslateError::invalid_route(id, "has no address"))?;
    Ok((prefix, address))
}
