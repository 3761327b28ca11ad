//! Translation of a fabric tree into downstream artifacts.
//!
//! - [`netconfig`]: the fabric-wide ONOS network configuration document
//! - [`chassis`]: one Stratum chassis config per switch
//! - [`placeholder`]: loopback addresses for switches managed by hostname
//!
//! Translation functions are pure; SIDs and placeholder addresses are
//! resolved by the caller and passed in. Failures are per entity.

pub mod chassis;
pub mod netconfig;
pub mod placeholder;

pub use chassis::{chassis_config, singleton_port, speed_bps, ChassisConfig, ChassisTranslation};
pub use netconfig::{
    address_to_mac, device_key, device_record, port_key, port_record, route_record, NetConfig,
    NETCONFIG_PATH, ROUTE_APP_NAME,
};
pub use placeholder::PlaceholderPool;
