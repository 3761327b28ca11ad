//! The synchronization engine.
//!
//! Configuration callbacks arrive through [`Synchronizer::synchronize`].
//! Applied and forced updates go into a single-slot mailbox and return at
//! once; one background worker drains it, retrying a failed update at a
//! fixed interval until it succeeds or a newer update supersedes it.
//! Deletes run on the caller's task, ahead of any queued or retrying update.
//!
//! Ordering between deletes and the worker uses two primitives:
//!
//! - a generation counter, bumped on every enqueue and delete, that the
//!   worker compares against between attempts to detect staleness
//! - a read/write gate: each attempt holds it shared, a delete holds it
//!   exclusively, so a delete waits for an in-flight attempt and no attempt
//!   starts while a delete runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::device::FabricSync;
use super::mailbox::Mailbox;
use crate::cache::PushCache;
use crate::error::{SyncError, SyncResult};
use crate::metrics::SyncMetrics;
use crate::model::{ConfigForest, ConfigUpdate, ModelCatalog, UpdateKind};

/// Default interval between retries of a failed update.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Inner {
    mailbox: Mailbox<ConfigUpdate>,
    generation: AtomicU64,
    gate: RwLock<()>,
    cache: Arc<PushCache>,
    device: Arc<dyn FabricSync>,
    retry_interval: Duration,
    metrics: Option<SyncMetrics>,
}

/// How one update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Superseded,
    Failed,
    Stopped,
}

impl Inner {
    fn superseded(&self, generation: u64) -> bool {
        self.mailbox.has_pending() || self.generation.load(Ordering::Acquire) != generation
    }

    fn record_superseded(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_superseded();
        }
    }

    fn enqueue(&self, update: ConfigUpdate) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(kind = %update.kind, fabric = %update.target, "Queueing update");
        if let Some(replaced) = self.mailbox.post(update) {
            debug!(fabric = %replaced.target, "Replaced pending update");
            self.record_superseded();
        }
    }

    async fn process(&self, update: &ConfigUpdate) -> Outcome {
        let generation = self.generation.load(Ordering::Acquire);
        let mut attempt: u32 = 0;

        loop {
            if self.superseded(generation) {
                info!(fabric = %update.target, attempt, "Update superseded by a newer one");
                self.record_superseded();
                return Outcome::Superseded;
            }

            let result = {
                let _gate = self.gate.read().await;
                // A delete may have run while we waited for the gate.
                if self.superseded(generation) {
                    info!(fabric = %update.target, attempt, "Update superseded by a newer one");
                    self.record_superseded();
                    return Outcome::Superseded;
                }
                attempt += 1;
                self.device.synchronize_device(&update.config).await
            };

            match result {
                Ok(0) => {
                    info!(fabric = %update.target, kind = %update.kind, attempt, "Synchronization complete");
                    return Outcome::Succeeded;
                }
                Ok(failures) => {
                    warn!(
                        fabric = %update.target,
                        failures,
                        attempt,
                        retry_in = ?self.retry_interval,
                        "Synchronization had push failures, will retry"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                    if self.mailbox.is_closed() {
                        return Outcome::Stopped;
                    }
                }
                Err(e) => {
                    error!(fabric = %update.target, error = %e, "Synchronization failed, discarding update");
                    return Outcome::Failed;
                }
            }
        }
    }

    async fn run(self: Arc<Self>) {
        info!("Synchronizer worker started");
        while let Some(update) = self.mailbox.recv().await {
            let outcome = self.process(&update).await;
            debug!(?outcome, fabric = %update.target, "Update finished");
            self.mailbox.complete();
        }
        info!("Synchronizer worker stopped");
    }
}

/// Coalescing, retrying front end of a [`FabricSync`].
pub struct Synchronizer {
    inner: Arc<Inner>,
    catalog: ModelCatalog,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Creates a synchronizer over `device`, sharing `cache` with it.
    ///
    /// Nothing is processed until [`Synchronizer::start`] is called.
    pub fn new(device: Arc<dyn FabricSync>, cache: Arc<PushCache>) -> Self {
        Self {
            inner: Arc::new(Inner {
                mailbox: Mailbox::new(),
                generation: AtomicU64::new(0),
                gate: RwLock::new(()),
                cache,
                device,
                retry_interval: DEFAULT_RETRY_INTERVAL,
                metrics: None,
            }),
            catalog: ModelCatalog::sdn_fabric(),
            worker: Mutex::new(None),
        }
    }

    /// Sets the interval between retries.
    ///
    /// Must be called before [`Synchronizer::start`].
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.retry_interval = retry_interval;
        }
        self
    }

    /// Counts superseded updates into `metrics`.
    ///
    /// Must be called before [`Synchronizer::start`].
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.metrics = Some(metrics);
        }
        self
    }

    /// Spawns the worker. Calling it again has no effect.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_none() {
            *worker = Some(tokio::spawn(self.inner.clone().run()));
        }
    }

    /// Handles one configuration callback.
    ///
    /// Applied and forced updates are queued and `Ok` means accepted, not
    /// applied. Deletes are applied before this returns, and their failure
    /// is returned.
    pub async fn synchronize(
        &self,
        config: Arc<ConfigForest>,
        kind: UpdateKind,
        target: &str,
        path: &[String],
    ) -> SyncResult<()> {
        if self.inner.mailbox.is_closed() {
            return Err(SyncError::Shutdown);
        }

        match kind {
            UpdateKind::Deleted => self.handle_delete(config, target, path).await,
            UpdateKind::Forced => {
                self.inner.cache.invalidate();
                self.inner.enqueue(ConfigUpdate::new(config, kind, target));
                Ok(())
            }
            UpdateKind::Applied => {
                self.inner.enqueue(ConfigUpdate::new(config, kind, target));
                Ok(())
            }
        }
    }

    /// Upstream callback entry point: like [`Synchronizer::synchronize`],
    /// but failures are only logged.
    pub async fn accept(
        &self,
        config: Arc<ConfigForest>,
        kind: UpdateKind,
        target: &str,
        path: &[String],
    ) {
        if let Err(e) = self.synchronize(config, kind, target, path).await {
            error!(%kind, fabric = target, error = %e, "Synchronize failed");
        }
    }

    async fn handle_delete(
        &self,
        config: Arc<ConfigForest>,
        target: &str,
        path: &[String],
    ) -> SyncResult<()> {
        // Marks any in-flight attempt stale before we wait for it.
        self.inner.generation.fetch_add(1, Ordering::AcqRel);

        let _gate = self.inner.gate.write().await;
        let dropped = self.inner.mailbox.take().is_some();
        let interrupted = dropped || self.inner.mailbox.is_running();
        info!(fabric = target, ?path, interrupted, "Applying delete");
        let result = self.inner.device.delete(&config, target, path).await;

        if interrupted {
            // The dropped or abandoned update may have covered other fabrics.
            // Queued before the gate opens, so a worker already holding the
            // pre-delete forest sees it as superseded.
            self.inner
                .enqueue(ConfigUpdate::new(config, UpdateKind::Applied, target));
        }

        result
    }

    /// Schema metadata of the served models.
    pub fn get_models(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Returns true while an update is queued or being processed.
    pub fn is_busy(&self) -> bool {
        self.inner.mailbox.is_busy()
    }

    /// Waits until the engine is idle. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.is_busy() {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Stops accepting updates and waits for the worker to exit.
    ///
    /// A queued update is still processed; a retrying one stops after its
    /// current sleep.
    pub async fn shutdown(&self) {
        self.inner.mailbox.close();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Synchronizer worker ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Scripted [`FabricSync`]: returns queued results, then zero failures.
    #[derive(Default)]
    struct ScriptedSync {
        results: Mutex<VecDeque<SyncResult<usize>>>,
        calls: AtomicUsize,
        deletes: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedSync {
        fn with_results(results: Vec<SyncResult<usize>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FabricSync for ScriptedSync {
        async fn synchronize_device(&self, _forest: &ConfigForest) -> SyncResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results.lock().pop_front().unwrap_or(Ok(0))
        }

        async fn delete(&self, _forest: &ConfigForest, target: &str, path: &[String]) -> SyncResult<()> {
            self.deletes.lock().push((target.to_string(), path.to_vec()));
            Ok(())
        }
    }

    fn engine(device: Arc<ScriptedSync>) -> Synchronizer {
        engine_over(device)
    }

    fn engine_over(device: Arc<dyn FabricSync>) -> Synchronizer {
        let sync = Synchronizer::new(device, Arc::new(PushCache::new()))
            .with_retry_interval(Duration::from_millis(10));
        sync.start();
        sync
    }

    #[tokio::test]
    async fn test_applied_update_runs_once() {
        let device = Arc::new(ScriptedSync::default());
        let sync = engine(device.clone());

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Applied, "fabric-one", &[])
            .await
            .unwrap();
        assert!(sync.wait_idle(Duration::from_secs(2)).await);
        assert_eq!(device.calls(), 1);
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_failures_are_retried() {
        let device = Arc::new(ScriptedSync::with_results(vec![Ok(2), Ok(1), Ok(0)]));
        let sync = engine(device.clone());

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Applied, "fabric-one", &[])
            .await
            .unwrap();
        assert!(sync.wait_idle(Duration::from_secs(2)).await);
        assert_eq!(device.calls(), 3);
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let device = Arc::new(ScriptedSync::with_results(vec![Err(SyncError::Shutdown)]));
        let sync = engine(device.clone());

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Applied, "fabric-one", &[])
            .await
            .unwrap();
        assert!(sync.wait_idle(Duration::from_secs(2)).await);
        assert_eq!(device.calls(), 1);
        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_forced_update_invalidates_cache() {
        let device = Arc::new(ScriptedSync::default());
        let cache = Arc::new(PushCache::new());
        cache.update(crate::cache::ArtifactKind::NetConfig, "fabric-one", &1);
        let sync = Synchronizer::new(device, cache.clone());

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Forced, "fabric-one", &[])
            .await
            .unwrap();
        assert!(cache.is_empty());
        // Not started, so the update stays queued.
        assert!(sync.is_busy());
    }

    #[tokio::test]
    async fn test_delete_drops_pending_and_requeues() {
        let device = Arc::new(ScriptedSync::default());
        let sync = Synchronizer::new(device.clone(), Arc::new(PushCache::new()));

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Applied, "fabric-one", &[])
            .await
            .unwrap();
        sync.synchronize(
            Arc::new(ConfigForest::new()),
            UpdateKind::Deleted,
            "fabric-two",
            &["switch".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(
            device.deletes.lock().clone(),
            vec![("fabric-two".to_string(), vec!["switch".to_string()])]
        );
        let requeued = sync.inner.mailbox.take().unwrap();
        assert_eq!(requeued.kind, UpdateKind::Applied);
        assert_eq!(requeued.target, "fabric-two");
    }

    /// Records the fabrics of every forest it synchronizes; the first call
    /// blocks until `release` is notified.
    #[derive(Default)]
    struct HeldSync {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FabricSync for HeldSync {
        async fn synchronize_device(&self, forest: &ConfigForest) -> SyncResult<usize> {
            let first = {
                let mut seen = self.seen.lock();
                seen.extend(forest.configs.keys().cloned());
                seen.len() == 1
            };
            if first {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(0)
        }

        async fn delete(&self, _forest: &ConfigForest, _target: &str, _path: &[String]) -> SyncResult<()> {
            Ok(())
        }
    }

    fn forest_of(fabric: &str) -> Arc<ConfigForest> {
        Arc::new(ConfigForest::new().with_fabric(fabric, crate::model::RootDevice::default()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_update_queued_before_delete_never_runs_after_it() {
        for _ in 0..20 {
            let device = Arc::new(HeldSync::default());
            let sync = Arc::new(engine_over(device.clone()));

            sync.synchronize(forest_of("first"), UpdateKind::Applied, "first", &[])
                .await
                .unwrap();
            device.entered.notified().await;

            // Queued behind the in-flight attempt; the delete below must win
            // whether or not the worker has dequeued it yet.
            sync.synchronize(forest_of("stale"), UpdateKind::Applied, "stale", &[])
                .await
                .unwrap();
            let delete = {
                let sync = sync.clone();
                tokio::spawn(async move {
                    sync.synchronize(forest_of("after-delete"), UpdateKind::Deleted, "stale", &[])
                        .await
                })
            };
            tokio::time::sleep(Duration::from_millis(10)).await;

            device.release.notify_one();
            delete.await.unwrap().unwrap();
            assert!(sync.wait_idle(Duration::from_secs(2)).await);

            assert_eq!(
                device.seen.lock().clone(),
                vec!["first".to_string(), "after-delete".to_string()]
            );
            sync.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_delete_on_idle_engine_does_not_requeue() {
        let device = Arc::new(ScriptedSync::default());
        let sync = Synchronizer::new(device, Arc::new(PushCache::new()));

        sync.synchronize(Arc::new(ConfigForest::new()), UpdateKind::Deleted, "fabric-one", &[])
            .await
            .unwrap();
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_updates() {
        let sync = engine(Arc::new(ScriptedSync::default()));
        sync.shutdown().await;

        let err = sync
            .synchronize(Arc::new(ConfigForest::new()), UpdateKind::Applied, "fabric-one", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Shutdown));
    }

    #[test]
    fn test_get_models() {
        let sync = Synchronizer::new(Arc::new(ScriptedSync::default()), Arc::new(PushCache::new()));
        assert_eq!(
            sync.get_models().supported_models(),
            vec!["sdn-fabric,Open Networking Foundation,0.1.x".to_string()]
        );
    }
}
