// Process monitoring collaborator: watch list in, status samples out

mod docker;
mod stats;

pub use docker::{DockerMonitor, DockerMonitorConfig};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::{ProcStatusSample, ServiceId};

/// Slow samples feed metric history and status; fast samples only status.
pub struct MonitorStreams {
    pub slow_rx: mpsc::Receiver<ProcStatusSample>,
    pub fast_rx: mpsc::Receiver<ProcStatusSample>,
}

#[async_trait]
pub trait MonitorService: Send + Sync {
    /// Replace the set of watched services.
    async fn watch(&self, services: Vec<ServiceId>);

    /// Emit a short burst of fast samples for a service expected to change state.
    async fn fast_poll(&self, service: ServiceId);
}

/// Channel pair for a monitor implementation and the manager loop.
pub fn channel(capacity: usize) -> (MonitorSenders, MonitorStreams) {
    let (slow_tx, slow_rx) = mpsc::channel(capacity);
    let (fast_tx, fast_rx) = mpsc::channel(capacity);
    (
        MonitorSenders { slow_tx, fast_tx },
        MonitorStreams { slow_rx, fast_rx },
    )
}

#[derive(Clone)]
pub struct MonitorSenders {
    pub slow_tx: mpsc::Sender<ProcStatusSample>,
    pub fast_tx: mpsc::Sender<ProcStatusSample>,
}
