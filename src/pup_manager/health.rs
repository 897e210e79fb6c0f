// Readiness verdict: required config present, dependencies provided and running.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{PupId, PupRecord, PupRuntimeStats, PupStatus};

use super::updates::PupUpdate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub needs_conf: bool,
    pub needs_deps: bool,
    /// Advisory only; does not affect [`HealthReport::can_start`].
    pub deps_not_running: Vec<String>,
}

impl HealthReport {
    pub fn can_start(&self) -> bool {
        !self.needs_conf && !self.needs_deps
    }

    /// The record-level changes this report implies.
    pub fn updates(&self) -> [PupUpdate; 2] {
        [
            PupUpdate::SetNeedsConf(self.needs_conf),
            PupUpdate::SetNeedsDeps(self.needs_deps),
        ]
    }
}

/// True if any required manifest field has no entry in the pup's config.
pub fn needs_conf(record: &PupRecord) -> bool {
    record
        .manifest
        .config
        .iter()
        .any(|field| field.required && !record.config.contains_key(&field.name))
}

pub fn evaluate(record: &PupRecord, stats: &HashMap<PupId, PupRuntimeStats>) -> HealthReport {
    let mut needs_deps = false;
    let mut deps_not_running = Vec::new();

    // Optional dependencies never gate startup but still report a stopped provider.
    for dep in &record.manifest.dependencies {
        let Some(provider_id) = record.providers.get(&dep.interface_name) else {
            needs_deps |= !dep.optional;
            continue;
        };
        match stats.get(provider_id) {
            None => needs_deps |= !dep.optional,
            Some(provider) if provider.status != PupStatus::Running => {
                deps_not_running.push(dep.interface_name.clone());
            }
            Some(_) => {}
        }
    }

    HealthReport {
        needs_conf: needs_conf(record),
        needs_deps,
        deps_not_running,
    }
}
