//! Shared fixtures: a two-switch fabric and an engine wired to in-memory
//! pushers and an in-memory SID store.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fabric_adapter::model::{
    Management, Port, PortVlans, Role, Route, Switch, SwitchModel, Vlan,
};
use fabric_adapter::pusher::{MemoryChassisPusher, MemoryControllerPusher};
use fabric_adapter::{
    ConfigForest, ControllerInfo, DeviceSettings, DeviceSynchronizer, PushCache, RootDevice,
    StaticLookup, SyncMetrics, Synchronizer,
};
use fabric_sid_store::{MemoryBackend, SidAllocator};

pub const FABRIC_ID: &str = "fabric-one";
pub const LEAF_ID: &str = "leaf-one";
pub const SPINE_ID: &str = "spine-one";
pub const NETCONFIG_URL: &str = "http://onos.fabric-one:8181/onos/v1/network/configuration";
pub const RETRY_INTERVAL: Duration = Duration::from_millis(20);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn vlan(id: u16, subnet: &str, description: &str) -> Vlan {
    Vlan {
        display_name: Some(format!("Test Vlan {}-{}", description, id)),
        description: Some(format!("TestVlan{}-{}", description, id)),
        subnets: vec![subnet.to_string()],
    }
}

/// A switch with VLANs 44 (tagged) and 55 (untagged) on port 2/2.
pub fn test_switch(display_name: &str, address: &str, port: u16, role: Role) -> Switch {
    Switch {
        display_name: Some(display_name.to_string()),
        description: Some(format!("Test {}", display_name)),
        model_id: Some("test".to_string()),
        role,
        management: Some(Management {
            address: Some(address.to_string()),
            port_number: Some(port),
        }),
        attributes: BTreeMap::from([
            ("driver".to_string(), "test-driver".to_string()),
            ("pipeconf".to_string(), "pipe.configuration".to_string()),
        ]),
        ports: vec![Port {
            cage_number: 2,
            channel_number: Some(2),
            display_name: Some("Port 1".to_string()),
            description: Some("port1".to_string()),
            speed: None,
            vlans: Some(PortVlans {
                untagged: Some(55),
                tagged: vec![44],
            }),
        }],
        vlans: BTreeMap::from([
            (44, vlan(44, "11.22.33.44/24", "tagged")),
            (55, vlan(55, "11.22.33.55/24", "untagged")),
        ]),
        switch_pair: None,
    }
}

pub fn leaf() -> Switch {
    test_switch("Leaf 1", "11.22.33.44", 2345, Role::Leaf)
}

pub fn spine() -> Switch {
    test_switch("Spine 1", "11.22.33.45", 2346, Role::Spine)
}

/// Fabric with a leaf, a spine, a 16-cage model and one route.
pub fn test_fabric() -> RootDevice {
    RootDevice {
        switches: BTreeMap::from([
            (LEAF_ID.to_string(), leaf()),
            (SPINE_ID.to_string(), spine()),
        ]),
        switch_models: BTreeMap::from([("test".to_string(), SwitchModel::with_cages(16))]),
        routes: BTreeMap::from([(
            "route-1".to_string(),
            Route {
                prefix: Some("10.1.0.0/16".to_string()),
                address: Some("11.22.33.1".to_string()),
                description: Some("uplink".to_string()),
            },
        )]),
    }
}

pub fn test_forest() -> ConfigForest {
    ConfigForest::new().with_fabric(FABRIC_ID, test_fabric())
}

/// Engine over in-memory capabilities.
pub struct Harness {
    pub backend: MemoryBackend,
    pub controller: MemoryControllerPusher,
    pub chassis: MemoryChassisPusher,
    pub cache: Arc<PushCache>,
    pub metrics: SyncMetrics,
    pub device: Arc<DeviceSynchronizer>,
    pub synchronizer: Synchronizer,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(DeviceSettings::default(), MemoryControllerPusher::new()).await
    }

    pub async fn with_settings(settings: DeviceSettings) -> Self {
        Self::build(settings, MemoryControllerPusher::new()).await
    }

    /// Harness whose controller pushes take `delay`.
    pub async fn with_slow_controller(delay: Duration) -> Self {
        Self::build(
            DeviceSettings::default(),
            MemoryControllerPusher::new().with_delay(delay),
        )
        .await
    }

    async fn build(settings: DeviceSettings, controller: MemoryControllerPusher) -> Self {
        let backend = MemoryBackend::new();
        let store = SidAllocator::new(backend.clone()).await.unwrap();
        let lookup = StaticLookup::default().with_fabric(
            FABRIC_ID,
            ControllerInfo::new("onos.fabric-one", 8181, "onos", "rocks"),
        );
        let chassis = MemoryChassisPusher::new();
        let cache = Arc::new(PushCache::new());
        let metrics = SyncMetrics::new().unwrap();

        let device = Arc::new(
            DeviceSynchronizer::new(
                Arc::new(store),
                Arc::new(lookup),
                Arc::new(controller.clone()),
                Arc::new(chassis.clone()),
                cache.clone(),
            )
            .with_settings(settings)
            .with_metrics(metrics.clone()),
        );

        let synchronizer = Synchronizer::new(device.clone(), cache.clone())
            .with_retry_interval(RETRY_INTERVAL)
            .with_metrics(metrics.clone());
        synchronizer.start();

        Self {
            backend,
            controller,
            chassis,
            cache,
            metrics,
            device,
            synchronizer,
        }
    }

    /// Waits for the engine to go idle, failing the test on timeout.
    pub async fn settle(&self) {
        assert!(
            self.synchronizer.wait_idle(IDLE_TIMEOUT).await,
            "engine did not go idle"
        );
    }
}

/// Polls `condition` until it holds, failing the test on timeout.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    assert!(
        tokio::time::timeout(IDLE_TIMEOUT, wait).await.is_ok(),
        "condition not met in time"
    );
}
