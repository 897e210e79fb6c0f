// Background ingestion of process-status samples.
// Slow samples update status and metric history; fast samples only status.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, interval};
use tracing::Instrument;

use super::{Inner, PupManager};
use crate::models::{ProcStatusSample, PupStatus};
use crate::monitor::MonitorStreams;

pub struct MonitorLoopConfig {
    /// How often to log manager stats (real seconds).
    pub stats_log_interval_secs: u64,
}

impl Inner {
    /// Fold one sample into stats. Samples for unknown pups are ignored.
    pub(crate) fn ingest_sample(&mut self, sample: &ProcStatusSample, record_metrics: bool) {
        for (service, status) in sample {
            let Some(enabled) = self.state.get(&service.pup_id).map(|r| r.enabled) else {
                tracing::trace!(service = %service, "sample for unknown pup");
                continue;
            };
            let Some(stats) = self.stats.get_mut(&service.pup_id) else {
                continue;
            };
            stats.status = PupStatus::derive(enabled, status.running);
            if record_metrics {
                stats.cpu_percent.push(status.cpu_percent);
                stats.mem_mb.push(status.mem_mb);
                stats.mem_percent.push(status.mem_percent);
                if let Some(disk) = status.disk_mb {
                    stats.disk_mb.push(disk);
                }
            }
        }
    }
}

impl PupManager {
    /// Apply one sample, recompute health and publish a stats snapshot.
    pub async fn ingest(&self, sample: &ProcStatusSample, record_metrics: bool) {
        let mut inner = self.inner.lock().await;
        inner.ingest_sample(sample, record_metrics);
        inner.recompute_health();
        inner.broadcast_stats();
    }

    /// Spawns the monitoring loop. Runs until shutdown or both streams close.
    pub fn spawn_monitor_loop(
        self: &Arc<Self>,
        streams: MonitorStreams,
        config: MonitorLoopConfig,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let MonitorStreams {
            mut slow_rx,
            mut fast_rx,
        } = streams;

        tokio::spawn(async move {
            let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut slow_open = true;
            let mut fast_open = true;
            let mut samples_total: u64 = 0;

            while slow_open || fast_open {
                tokio::select! {
                    sample = slow_rx.recv(), if slow_open => {
                        match sample {
                            Some(sample) => {
                                manager.ingest(&sample, true).await;
                                samples_total += 1;
                            }
                            None => slow_open = false,
                        }
                    }
                    sample = fast_rx.recv(), if fast_open => {
                        match sample {
                            Some(sample) => {
                                manager.ingest(&sample, false).await;
                                samples_total += 1;
                            }
                            None => fast_open = false,
                        }
                    }
                    _ = stats_log_tick.tick() => {
                        let inner = manager.inner.lock().await;
                        let (pupdate_subs, stats_subs) = inner.subscriber_counts();
                        tracing::info!(
                            pups = inner.state.len(),
                            running = inner.stats.values().filter(|s| s.status == PupStatus::Running).count(),
                            pupdate_subscribers = pupdate_subs,
                            stats_subscribers = stats_subs,
                            samples_total,
                            "manager stats"
                        );
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Monitor loop shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(tracing::debug_span!("monitor_loop")))
    }
}
