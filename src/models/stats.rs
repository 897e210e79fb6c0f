// In-memory runtime stats per pup (never persisted)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use super::{PupId, PupManifest};

/// Derived run status; serializes lowercase (e.g. "running").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PupStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl PupStatus {
    /// Combine user intent with what the monitor observed.
    pub fn derive(enabled: bool, running: bool) -> Self {
        match (enabled, running) {
            (true, true) => PupStatus::Running,
            (false, true) => PupStatus::Stopping,
            (true, false) => PupStatus::Starting,
            (false, false) => PupStatus::Stopped,
        }
    }
}

/// Fixed-capacity rolling series; oldest values fall off the front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatBuffer {
    capacity: usize,
    values: VecDeque<f64>,
}

impl FloatBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values oldest-first.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupIssues {
    /// Interfaces whose selected provider exists but is not running.
    pub deps_not_running: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupRuntimeStats {
    pub id: PupId,
    pub status: PupStatus,
    pub cpu_percent: FloatBuffer,
    pub mem_mb: FloatBuffer,
    pub mem_percent: FloatBuffer,
    pub disk_mb: FloatBuffer,
    /// Manifest-declared metrics, keyed by metric name.
    pub metrics: BTreeMap<String, FloatBuffer>,
    pub issues: PupIssues,
}

impl PupRuntimeStats {
    pub fn new(id: PupId, manifest: &PupManifest, buffer_size: usize) -> Self {
        let metrics = manifest
            .metrics
            .iter()
            .map(|m| (m.name.clone(), FloatBuffer::new(buffer_size)))
            .collect();
        Self {
            id,
            status: PupStatus::Stopped,
            cpu_percent: FloatBuffer::new(buffer_size),
            mem_mb: FloatBuffer::new(buffer_size),
            mem_percent: FloatBuffer::new(buffer_size),
            disk_mb: FloatBuffer::new(buffer_size),
            metrics,
            issues: PupIssues::default(),
        }
    }
}
