//! Per-fabric synchronization of ONOS and Stratum.
//!
//! One pass over a [`ConfigForest`] builds, for every fabric, a single ONOS
//! netconfig document (devices, ports, routes) and one chassis config per
//! switch, then pushes them. Bad switches, ports and routes are logged and
//! left out; only failed pushes are counted, and the count is what the
//! engine retries on.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fabric_sid_store::{SidStore, SidStoreError};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ArtifactKind, PushCache};
use crate::config::SynchronizerConfig;
use crate::error::{SyncError, SyncResult, TranslateError};
use crate::lookup::ControllerLookup;
use crate::metrics::SyncMetrics;
use crate::model::{ConfigForest, RootDevice, Switch, SwitchModel};
use crate::pusher::{ChassisPusher, ControllerPusher};
use crate::translate::{
    chassis_config, device_key, device_record, port_record, route_record, NetConfig,
    PlaceholderPool,
};
use crate::validate::{lookup_model, require_management, unique_ports, validate_switch};

/// The work the engine schedules.
#[async_trait]
pub trait FabricSync: Send + Sync {
    /// Synchronizes every fabric of `forest`, returning the number of failed
    /// pushes. An `Err` means the pass could not run at all.
    async fn synchronize_device(&self, forest: &ConfigForest) -> SyncResult<usize>;

    /// Applies a delete of `path` under fabric `target`. `forest` is the
    /// desired state after the delete; an empty `path` removes the fabric.
    async fn delete(&self, forest: &ConfigForest, target: &str, path: &[String]) -> SyncResult<()>;
}

/// Push behaviour of a [`DeviceSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Push artifacts; when false they are only translated and logged.
    pub post_enable: bool,
    /// Skip netconfig pushes identical to the last successful one.
    pub partial_update_enable: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            post_enable: true,
            partial_update_enable: true,
        }
    }
}

impl From<&SynchronizerConfig> for DeviceSettings {
    fn from(config: &SynchronizerConfig) -> Self {
        Self {
            post_enable: config.post_enable,
            partial_update_enable: config.partial_update_enable,
        }
    }
}

/// A switch that resolved its model, kept for the chassis pass.
struct ResolvedSwitch<'a> {
    id: &'a str,
    switch: &'a Switch,
    model: &'a SwitchModel,
}

/// Production [`FabricSync`].
pub struct DeviceSynchronizer {
    sid_store: Arc<dyn SidStore>,
    lookup: Arc<dyn ControllerLookup>,
    controller: Arc<dyn ControllerPusher>,
    chassis: Arc<dyn ChassisPusher>,
    cache: Arc<PushCache>,
    placeholders: Mutex<PlaceholderPool>,
    settings: DeviceSettings,
    metrics: Option<SyncMetrics>,
}

impl DeviceSynchronizer {
    /// Creates a synchronizer with default settings.
    pub fn new(
        sid_store: Arc<dyn SidStore>,
        lookup: Arc<dyn ControllerLookup>,
        controller: Arc<dyn ControllerPusher>,
        chassis: Arc<dyn ChassisPusher>,
        cache: Arc<PushCache>,
    ) -> Self {
        Self {
            sid_store,
            lookup,
            controller,
            chassis,
            cache,
            placeholders: Mutex::new(PlaceholderPool::new()),
            settings: DeviceSettings::default(),
            metrics: None,
        }
    }

    /// Sets the push behaviour.
    pub fn with_settings(mut self, settings: DeviceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Records per-fabric metrics into `metrics`.
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The cache shared with the engine.
    pub fn cache(&self) -> &Arc<PushCache> {
        &self.cache
    }

    fn record_push_failure(&self, kind: ArtifactKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_push_failure(kind);
        }
    }

    /// Adds the device record and port records of one switch.
    async fn translate_switch(
        &self,
        fabric_id: &str,
        switch_id: &str,
        switch: &Switch,
        model: &SwitchModel,
        netconfig: &mut NetConfig,
    ) -> Result<(), TranslateError> {
        let validated = validate_switch(fabric_id, switch_id, switch)?;

        let sid = self
            .sid_store
            .allocate(switch_id)
            .await
            .map_err(|source| TranslateError::Sid {
                fabric: fabric_id.to_string(),
                switch: switch_id.to_string(),
                source,
            })?;
        let loopback = self
            .placeholders
            .lock()
            .loopback_for(validated.management.address)?;

        let device = device_record(&validated, sid, &loopback)?;
        netconfig.devices.insert(device_key(switch_id), device);

        let (ports, duplicates) = unique_ports(switch_id, &switch.sorted_ports());
        for e in &duplicates {
            warn!(switch = switch_id, error = %e, "Skipping port");
        }
        for port in ports {
            match port_record(switch_id, switch, model, port) {
                Ok((key, record)) => {
                    netconfig.ports.insert(key, record);
                }
                Err(e) => warn!(switch = switch_id, error = %e, "Skipping port"),
            }
        }

        Ok(())
    }

    /// Pushes the netconfig document of a fabric. Returns the failure count.
    async fn push_netconfig(&self, fabric_id: &str, netconfig: &NetConfig) -> usize {
        if self.settings.partial_update_enable
            && self.cache.check(ArtifactKind::NetConfig, fabric_id, netconfig)
        {
            debug!(fabric = fabric_id, "Netconfig unchanged, skipping push");
            return 0;
        }

        let payload = match netconfig.to_json() {
            Ok(payload) => payload,
            Err(source) => {
                let e = SyncError::Serialize {
                    fabric: fabric_id.to_string(),
                    source,
                };
                warn!(error = %e, "Unable to serialize netconfig");
                return 1;
            }
        };

        if !self.settings.post_enable {
            info!(
                fabric = fabric_id,
                bytes = payload.len(),
                "Push disabled, netconfig not posted"
            );
            debug!(payload = %String::from_utf8_lossy(&payload), "Netconfig");
            return 0;
        }

        let controller = match self.lookup.lookup(fabric_id).await {
            Ok(controller) => controller,
            Err(e) => {
                warn!(error = %e, "Unable to resolve controller");
                return 1;
            }
        };

        let url = controller.netconfig_url();
        match self
            .controller
            .push_update(&url, &controller.username, &controller.password, &payload)
            .await
        {
            Ok(()) => {
                info!(fabric = fabric_id, endpoint = %url, "Pushed netconfig");
                self.cache.update(ArtifactKind::NetConfig, fabric_id, netconfig);
                0
            }
            Err(e) => {
                warn!(fabric = fabric_id, error = %e, "Netconfig push failed");
                self.record_push_failure(ArtifactKind::NetConfig);
                1
            }
        }
    }

    /// Translates and pushes the chassis config of one switch. Returns the
    /// failure count.
    async fn push_chassis(&self, fabric_id: &str, resolved: &ResolvedSwitch<'_>) -> usize {
        let management = match require_management(fabric_id, resolved.id, resolved.switch) {
            Ok(management) => management,
            Err(e) => {
                warn!(error = %e, "Skipping chassis config");
                return 0;
            }
        };

        let ports = resolved.switch.sorted_ports();
        let translation = chassis_config(
            resolved.id,
            resolved.switch.name_or(resolved.id),
            &ports,
            resolved.model,
        );
        for e in &translation.skipped {
            warn!(error = %e, "Skipping chassis port");
        }

        let payload = translation.config.to_text_proto();
        let endpoint = management.agent_uri();

        if !self.settings.post_enable {
            info!(switch = resolved.id, "Push disabled, chassis config not set");
            debug!(%payload, "Chassis config");
            return 0;
        }

        match self.chassis.push_update(&endpoint, &payload).await {
            Ok(()) => {
                info!(switch = resolved.id, %endpoint, "Pushed chassis config");
                0
            }
            Err(e) => {
                warn!(switch = resolved.id, error = %e, "Chassis config push failed");
                self.record_push_failure(ArtifactKind::ChassisConfig);
                1
            }
        }
    }

    /// Runs the full procedure for one fabric.
    #[instrument(skip_all, fields(fabric = %fabric_id))]
    async fn synchronize_fabric(&self, fabric_id: &str, fabric: &RootDevice) -> SyncResult<usize> {
        let mut failures = 0;
        let mut netconfig = NetConfig::new();
        let mut resolved = Vec::with_capacity(fabric.switches.len());

        for (switch_id, switch) in &fabric.switches {
            let model = match lookup_model(fabric, switch_id, switch) {
                Ok(model) => model,
                Err(e) => {
                    warn!(error = %e, "Skipping switch");
                    continue;
                }
            };

            match self
                .translate_switch(fabric_id, switch_id, switch, model, &mut netconfig)
                .await
            {
                Ok(()) => {}
                Err(TranslateError::Sid {
                    source: SidStoreError::Closed,
                    ..
                }) => return Err(SyncError::SidStore(SidStoreError::Closed)),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "SID store unavailable");
                    failures += 1;
                }
                Err(e) => warn!(error = %e, "Skipping switch in netconfig"),
            }

            resolved.push(ResolvedSwitch {
                id: switch_id,
                switch,
                model,
            });
        }

        for (route_id, route) in &fabric.routes {
            match route_record(route_id, route) {
                Ok(route) => netconfig.add_route(route),
                Err(e) => warn!(error = %e, "Skipping route"),
            }
        }

        failures += self.push_netconfig(fabric_id, &netconfig).await;

        for switch in &resolved {
            failures += self.push_chassis(fabric_id, switch).await;
        }

        Ok(failures)
    }

    async fn delete_fabric(&self, fabric_id: &str) -> SyncResult<()> {
        self.cache.remove(ArtifactKind::NetConfig, fabric_id);

        if !self.settings.post_enable {
            info!(fabric = fabric_id, "Push disabled, netconfig not deleted");
            return Ok(());
        }

        let controller = self.lookup.lookup(fabric_id).await?;
        let url = controller.netconfig_url();
        self.controller.push_delete(&url).await.map_err(|e| {
            self.record_push_failure(ArtifactKind::NetConfig);
            e
        })?;
        info!(fabric = fabric_id, endpoint = %url, "Deleted netconfig");
        Ok(())
    }
}

#[async_trait]
impl FabricSync for DeviceSynchronizer {
    async fn synchronize_device(&self, forest: &ConfigForest) -> SyncResult<usize> {
        let mut failures = 0;
        for (fabric_id, fabric) in &forest.configs {
            let started = Instant::now();
            failures += self.synchronize_fabric(fabric_id, fabric).await?;
            if let Some(metrics) = &self.metrics {
                metrics.record_synchronization(fabric_id);
                metrics.observe_duration(fabric_id, started.elapsed().as_secs_f64());
            }
        }
        Ok(failures)
    }

    #[instrument(skip_all, fields(fabric = %target, ?path))]
    async fn delete(&self, forest: &ConfigForest, target: &str, path: &[String]) -> SyncResult<()> {
        match forest.configs.get(target) {
            Some(fabric) if !path.is_empty() => {
                debug!(?path, "Resynchronizing fabric after delete");
                let failures = self.synchronize_fabric(target, fabric).await?;
                if failures > 0 {
                    return Err(SyncError::DeleteFailed {
                        target: target.to_string(),
                        failures,
                    });
                }
                Ok(())
            }
            _ => self.delete_fabric(target).await,
        }
    }
}
