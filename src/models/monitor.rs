// Monitoring samples keyed by an explicit pup ID

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::PupId;

/// One monitored unit belonging to a pup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceId {
    pub pup_id: PupId,
    pub service: String,
}

impl ServiceId {
    /// The pup's main container.
    pub fn container(pup_id: impl Into<PupId>) -> Self {
        Self {
            pup_id: pup_id.into(),
            service: "container".into(),
        }
    }

    /// Container name the OS layer gives this pup.
    pub fn container_name(&self) -> String {
        format!("{}{}", crate::version::CONTAINER_PREFIX, self.pup_id)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pup_id, self.service)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcStatus {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub mem_mb: f64,
    pub running: bool,
    /// Size of the pup's storage, when the monitor measures it.
    #[serde(default)]
    pub disk_mb: Option<f64>,
}

pub type ProcStatusSample = HashMap<ServiceId, ProcStatus>;
