// Pup manager: owns live pup state and stats, allocates resources,
// persists records and fans out change notifications.
//
// Locking: `state` guards the maps, allocator and subscriber sets and is only
// held for in-memory work. `writes` serializes adopt/update/purge end to end
// (allocate or mutate -> persist -> commit), so persistence never runs under
// `state` and the monitoring loop is never stuck behind a slow disk.

pub mod allocation;
pub mod dependencies;
pub mod health;
mod monitor_loop;
pub mod updates;

pub use allocation::Allocator;
pub use health::HealthReport;
pub use monitor_loop::MonitorLoopConfig;
pub use updates::PupUpdate;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::config::AllocationConfig;
use crate::error::{PupError, PupResult};
use crate::models::{
    DependencyReport, InstallationPhase, PupId, PupManifest, PupRecord, PupRuntimeStats,
    PupSource, Pupdate, PupdateKind, ServiceId, WebUiBinding,
};
use crate::monitor::MonitorService;
use crate::sources::SourceManager;
use crate::store::PupStore;

/// Collaborators the manager talks to.
pub struct ManagerDeps {
    pub store: PupStore,
    pub sources: Arc<dyn SourceManager>,
    pub monitor: Option<Arc<dyn MonitorService>>,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub allocation: AllocationConfig,
    pub metric_buffer_size: usize,
    pub subscriber_capacity: usize,
}

pub(crate) struct Inner {
    pub(crate) state: HashMap<PupId, PupRecord>,
    pub(crate) stats: HashMap<PupId, PupRuntimeStats>,
    allocator: Allocator,
    pupdate_subs: Vec<mpsc::Sender<Pupdate>>,
    stats_subs: Vec<mpsc::Sender<Vec<PupRuntimeStats>>>,
}

impl Inner {
    /// Re-derive health flags and advisory issues for every pup from current stats.
    pub(crate) fn recompute_health(&mut self) {
        let reports: Vec<(PupId, HealthReport)> = self
            .state
            .values()
            .map(|r| (r.id.clone(), health::evaluate(r, &self.stats)))
            .collect();
        for (id, report) in reports {
            if let Some(stats) = self.stats.get_mut(&id) {
                stats.issues.deps_not_running = report.deps_not_running.clone();
            }
            if let Some(record) = self.state.get_mut(&id) {
                let mut ignored = Vec::new();
                for update in report.updates() {
                    update.apply(record, &mut ignored);
                }
            }
        }
    }

    /// Non-blocking fan-out; full or closed subscribers are dropped.
    fn emit_pupdate(&mut self, update: &Pupdate) {
        self.pupdate_subs.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(pup_id = %update.id, "pupdate subscriber full; dropping it");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub(crate) fn broadcast_stats(&mut self) {
        if self.stats_subs.is_empty() {
            return;
        }
        let snapshot = sorted_stats(&self.stats);
        self.stats_subs.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("stats subscriber full; dropping it");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub(crate) fn subscriber_counts(&self) -> (usize, usize) {
        (self.pupdate_subs.len(), self.stats_subs.len())
    }
}

fn sorted_stats(stats: &HashMap<PupId, PupRuntimeStats>) -> Vec<PupRuntimeStats> {
    let mut out: Vec<PupRuntimeStats> = stats.values().cloned().collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

fn generate_pup_id() -> PupId {
    hex::encode(rand::random::<[u8; 16]>())
}

pub struct PupManager {
    pub(crate) inner: Mutex<Inner>,
    writes: Mutex<()>,
    store: PupStore,
    sources: Arc<dyn SourceManager>,
    monitor: Option<Arc<dyn MonitorService>>,
    config: ManagerConfig,
}

impl PupManager {
    /// Restore every stored record, rebuild the IP high-water mark and health.
    #[instrument(skip_all, fields(operation = "load_pups"))]
    pub async fn load(deps: ManagerDeps, config: ManagerConfig) -> PupResult<Arc<Self>> {
        let ManagerDeps {
            store,
            sources,
            monitor,
        } = deps;

        let records = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.load_all()).await??
        };
        let allocator = Allocator::new(config.allocation.clone(), records.iter());
        let stats = records
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    PupRuntimeStats::new(r.id.clone(), &r.manifest, config.metric_buffer_size),
                )
            })
            .collect();
        let state: HashMap<PupId, PupRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();

        info!(
            pups = state.len(),
            last_ip = %allocator.last_ip(),
            "pup manager loaded"
        );

        let mut inner = Inner {
            state,
            stats,
            allocator,
            pupdate_subs: Vec::new(),
            stats_subs: Vec::new(),
        };
        inner.recompute_health();

        let manager = Arc::new(Self {
            inner: Mutex::new(inner),
            writes: Mutex::new(()),
            store,
            sources,
            monitor,
            config,
        });
        manager.refresh_watch_list().await;
        Ok(manager)
    }

    pub fn store(&self) -> &PupStore {
        &self.store
    }

    /// Register a new pup: allocate ID, IP and UI ports, persist, index, notify.
    #[instrument(skip(self, manifest, source), fields(operation = "adopt_pup", pup = %manifest.meta.name, version = %manifest.meta.version))]
    pub async fn adopt_pup(
        &self,
        manifest: PupManifest,
        source: PupSource,
    ) -> PupResult<PupRecord> {
        let _write = self.writes.lock().await;

        let record = {
            let inner = self.inner.lock().await;
            if let Some(existing) = inner
                .state
                .values()
                .find(|r| r.is_same_package(&manifest, &source))
            {
                return Err(PupError::AlreadyExists {
                    existing_id: existing.id.clone(),
                });
            }

            let mut id = generate_pup_id();
            while inner.state.contains_key(&id) {
                id = generate_pup_id();
            }

            inner
                .allocator
                .check_host_ports(&manifest, inner.state.values())?;
            let ip = inner.allocator.next_ip()?;
            let uis: Vec<_> = manifest.web_ui_exposes().cloned().collect();
            let ports =
                inner
                    .allocator
                    .allocate_ports(uis.len(), &manifest, inner.state.values())?;
            let web_uis = uis
                .into_iter()
                .zip(ports)
                .map(|(expose, host_port)| WebUiBinding {
                    name: expose.name,
                    internal_port: expose.port,
                    host_port,
                })
                .collect();

            let mut record = PupRecord {
                id,
                installation: InstallationPhase::Installing,
                enabled: false,
                config: HashMap::new(),
                ip,
                web_uis,
                providers: HashMap::new(),
                manifest,
                source,
                needs_conf: false,
                needs_deps: false,
            };
            let mut ignored = Vec::new();
            for update in health::evaluate(&record, &inner.stats).updates() {
                update.apply(&mut record, &mut ignored);
            }
            record
        };

        self.store.save_async(&record).await?;

        {
            let mut inner = self.inner.lock().await;
            inner.allocator.commit_ip(record.ip);
            inner.stats.insert(
                record.id.clone(),
                PupRuntimeStats::new(
                    record.id.clone(),
                    &record.manifest,
                    self.config.metric_buffer_size,
                ),
            );
            inner.state.insert(record.id.clone(), record.clone());
            inner.recompute_health();
            inner.emit_pupdate(&Pupdate::new(PupdateKind::Adopted, &record));
        }

        info!(pup_id = %record.id, ip = %record.ip, web_uis = record.web_uis.len(), "pup adopted");
        self.refresh_watch_list().await;
        Ok(record)
    }

    /// Apply `updates` in order as one persisted change.
    #[instrument(skip(self, updates), fields(operation = "update_pup", pup_id = %id, updates = updates.len()))]
    pub async fn update_pup(&self, id: &str, updates: Vec<PupUpdate>) -> PupResult<PupRecord> {
        let _write = self.writes.lock().await;

        let (record, events) = {
            let inner = self.inner.lock().await;
            let mut record = inner
                .state
                .get(id)
                .cloned()
                .ok_or_else(|| PupError::NotFound(id.to_string()))?;
            for update in &updates {
                if let Some(missing) = update
                    .referenced_providers()
                    .into_iter()
                    .find(|p| !inner.state.contains_key(p.as_str()))
                {
                    return Err(PupError::Validation(format!(
                        "provider pup {missing} is not installed"
                    )));
                }
            }
            let mut events = Vec::new();
            for update in updates {
                update.apply(&mut record, &mut events);
            }
            let mut ignored = Vec::new();
            for update in health::evaluate(&record, &inner.stats).updates() {
                update.apply(&mut record, &mut ignored);
            }
            (record, events)
        };

        self.store.save_async(&record).await?;

        {
            let mut inner = self.inner.lock().await;
            inner.state.insert(record.id.clone(), record.clone());
            inner.recompute_health();
            for kind in &events {
                inner.emit_pupdate(&Pupdate::new(*kind, &record));
            }
        }

        if events.contains(&PupdateKind::EnabledChanged)
            && let Some(monitor) = &self.monitor
        {
            monitor.fast_poll(ServiceId::container(record.id.clone())).await;
        }
        debug!(events = ?events, "pup updated");
        Ok(record)
    }

    /// Drop a pup from the index. Storage volumes and the stored record are
    /// left for the caller (see [`PupStore::delete`]).
    #[instrument(skip(self), fields(operation = "purge_pup"))]
    pub async fn purge_pup(&self, id: &str) -> PupResult<()> {
        let _write = self.writes.lock().await;
        {
            let mut inner = self.inner.lock().await;
            if inner.state.remove(id).is_none() {
                return Err(PupError::NotFound(id.to_string()));
            }
            inner.stats.remove(id);
            inner.recompute_health();
            inner.emit_pupdate(&Pupdate::purged(id.to_string()));
        }
        info!(pup_id = %id, "pup purged");
        self.refresh_watch_list().await;
        Ok(())
    }

    pub async fn get_pup(&self, id: &str) -> PupResult<PupRecord> {
        self.inner
            .lock()
            .await
            .state
            .get(id)
            .cloned()
            .ok_or_else(|| PupError::NotFound(id.to_string()))
    }

    pub async fn get_stats(&self, id: &str) -> PupResult<PupRuntimeStats> {
        self.inner
            .lock()
            .await
            .stats
            .get(id)
            .cloned()
            .ok_or_else(|| PupError::NotFound(id.to_string()))
    }

    /// All records, ordered by IP (i.e. adoption order).
    pub async fn list_pups(&self) -> Vec<PupRecord> {
        let mut out: Vec<PupRecord> = self.inner.lock().await.state.values().cloned().collect();
        out.sort_by(|a, b| a.ip.cmp(&b.ip));
        out
    }

    pub async fn list_stats(&self) -> Vec<PupRuntimeStats> {
        sorted_stats(&self.inner.lock().await.stats)
    }

    /// Feed of discrete pup changes. At-most-once: a subscriber that falls
    /// behind is dropped and should re-fetch full state on reconnect.
    pub async fn subscribe_pupdates(&self) -> mpsc::Receiver<Pupdate> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        self.inner.lock().await.pupdate_subs.push(tx);
        rx
    }

    /// Feed of full stats snapshots, one per monitoring sample.
    pub async fn subscribe_stats(&self) -> mpsc::Receiver<Vec<PupRuntimeStats>> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        self.inner.lock().await.stats_subs.push(tx);
        rx
    }

    pub async fn health(&self, id: &str) -> PupResult<HealthReport> {
        let inner = self.inner.lock().await;
        let record = inner
            .state
            .get(id)
            .ok_or_else(|| PupError::NotFound(id.to_string()))?;
        Ok(health::evaluate(record, &inner.stats))
    }

    /// False while required config is missing or a dependency is unmet.
    pub async fn can_pup_start(&self, id: &str) -> PupResult<bool> {
        Ok(self.health(id).await?.can_start())
    }

    /// Per-dependency report. Catalog failures are recorded inline.
    #[instrument(skip(self), fields(operation = "dependency_report"))]
    pub async fn dependency_report(&self, id: &str) -> PupResult<Vec<DependencyReport>> {
        let (record, installed) = {
            let inner = self.inner.lock().await;
            let record = inner
                .state
                .get(id)
                .cloned()
                .ok_or_else(|| PupError::NotFound(id.to_string()))?;
            (record, inner.state.values().cloned().collect::<Vec<_>>())
        };

        let catalogs = self.sources.list_all(false).await;
        let reports = match &catalogs {
            Ok(lists) => dependencies::resolve(&record, &installed, Ok(lists)),
            Err(e) => {
                warn!(error = %e, "catalog listing failed; reporting installed providers only");
                let msg = e.to_string();
                dependencies::resolve(&record, &installed, Err(&msg))
            }
        };
        Ok(reports)
    }

    /// Push values for manifest-declared metrics. Unknown names are ignored.
    pub async fn record_metrics(&self, id: &str, values: HashMap<String, f64>) -> PupResult<()> {
        let mut inner = self.inner.lock().await;
        let stats = inner
            .stats
            .get_mut(id)
            .ok_or_else(|| PupError::NotFound(id.to_string()))?;
        for (name, value) in values {
            match stats.metrics.get_mut(&name) {
                Some(buffer) => buffer.push(value),
                None => debug!(pup_id = %id, metric = %name, "ignoring undeclared metric"),
            }
        }
        Ok(())
    }

    async fn refresh_watch_list(&self) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        let services: Vec<ServiceId> = {
            let inner = self.inner.lock().await;
            inner
                .state
                .keys()
                .map(|id| ServiceId::container(id.clone()))
                .collect()
        };
        monitor.watch(services).await;
    }
}
