// Container status via bollard: one `pup-<id>` container per pup

use super::stats;
use super::{MonitorSenders, MonitorService};
use crate::models::{ProcStatus, ProcStatusSample, ServiceId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct DockerMonitorConfig {
    pub slow_interval_ms: u64,
    pub fast_interval_ms: u64,
    pub fast_poll_count: u32,
    /// Root holding one storage directory per pup; measured for the disk metric.
    pub data_dir: Option<PathBuf>,
}

pub struct DockerMonitor {
    docker: Docker,
    watched: RwLock<Vec<ServiceId>>,
    senders: MonitorSenders,
    config: DockerMonitorConfig,
}

impl DockerMonitor {
    pub fn connect(config: DockerMonitorConfig, senders: MonitorSenders) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self {
            docker,
            watched: RwLock::new(Vec::new()),
            senders,
            config,
        })
    }

    /// Spawns the slow sampling loop. Ends on shutdown or when the manager drops its receiver.
    pub fn spawn(
        self: &Arc<Self>,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(this.config.slow_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let services = this.watched.read().await.clone();
                        if services.is_empty() {
                            continue;
                        }
                        let sample = sample(
                            &this.docker,
                            &services,
                            this.config.data_dir.as_deref(),
                        )
                        .await;
                        if this.senders.slow_tx.send(sample).await.is_err() {
                            debug!("slow sample channel closed");
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Docker monitor shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl MonitorService for DockerMonitor {
    async fn watch(&self, services: Vec<ServiceId>) {
        debug!(count = services.len(), "updating watch list");
        *self.watched.write().await = services;
    }

    async fn fast_poll(&self, service: ServiceId) {
        let docker = self.docker.clone();
        let fast_tx = self.senders.fast_tx.clone();
        let every = Duration::from_millis(self.config.fast_interval_ms);
        let count = self.config.fast_poll_count;
        tokio::spawn(async move {
            let services = [service];
            for _ in 0..count {
                tokio::time::sleep(every).await;
                let sample = sample(&docker, &services, None).await;
                if fast_tx.send(sample).await.is_err() {
                    break;
                }
            }
        });
    }
}

/// Names of running containers mapped to their IDs.
async fn running_containers(docker: &Docker) -> Option<HashMap<String, String>> {
    let mut filters = HashMap::new();
    filters.insert("status".to_string(), vec!["running".to_string()]);
    let filter = ListContainersOptions {
        all: false,
        filters: Some(filters),
        ..Default::default()
    };

    let containers = match docker.list_containers(Some(filter)).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Docker list_containers failed: {}", e);
            return None;
        }
    };

    let mut out = HashMap::with_capacity(containers.len());
    for c in containers {
        let id = c.id.unwrap_or_default();
        for name in c.names.unwrap_or_default() {
            out.insert(name.trim_start_matches('/').to_string(), id.clone());
        }
    }
    Some(out)
}

async fn one_stats_sample(docker: &Docker, container_id: &str) -> Option<ProcStatus> {
    let options = StatsOptions {
        stream: false,
        ..Default::default()
    };
    let mut stream = docker.stats(container_id, Some(options));
    match stream.next().await {
        Some(Ok(s)) => stats::process_statistics(&s),
        Some(Err(e)) => {
            warn!("Stats request failed for container {}: {}", container_id, e);
            None
        }
        None => None,
    }
}

fn dir_size_mb(path: &Path) -> f64 {
    let bytes: u64 = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum();
    bytes as f64 / BYTES_PER_MB
}

/// Sample each service once. Services whose container is not running report
/// `running: false`. If Docker cannot be reached the sample is empty rather
/// than claiming everything stopped.
async fn sample(
    docker: &Docker,
    services: &[ServiceId],
    data_dir: Option<&Path>,
) -> ProcStatusSample {
    let mut out = ProcStatusSample::with_capacity(services.len());
    let Some(running) = running_containers(docker).await else {
        return out;
    };

    for service in services {
        let mut status = match running.get(&service.container_name()) {
            Some(container_id) => one_stats_sample(docker, container_id)
                .await
                .unwrap_or(ProcStatus {
                    running: true,
                    ..Default::default()
                }),
            None => ProcStatus::default(),
        };
        if let Some(root) = data_dir {
            let dir = root.join(&service.pup_id);
            status.disk_mb = tokio::task::spawn_blocking(move || dir_size_mb(&dir))
                .await
                .ok();
        }
        out.insert(service.clone(), status);
    }
    out
}
