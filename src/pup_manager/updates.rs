// Named field changes applied to a pup record in one locked pass

use std::collections::HashMap;

use crate::models::{InstallationPhase, PupId, PupRecord, PupdateKind};

#[derive(Debug, Clone, PartialEq)]
pub enum PupUpdate {
    SetInstallation(InstallationPhase),
    /// Merged into the existing config map.
    SetConfig(HashMap<String, String>),
    SetEnabled(bool),
    SetNeedsConf(bool),
    SetNeedsDeps(bool),
    SetProvider { interface: String, provider: PupId },
    /// Replaces the whole provider map.
    SetProviders(HashMap<String, PupId>),
}

impl PupUpdate {
    /// Provider IDs this update points at, for existence checks.
    pub fn referenced_providers(&self) -> Vec<&PupId> {
        match self {
            PupUpdate::SetProvider { provider, .. } => vec![provider],
            PupUpdate::SetProviders(map) => map.values().collect(),
            _ => vec![],
        }
    }

    /// Apply to `record`, queueing the notification kinds it produces.
    pub fn apply(self, record: &mut PupRecord, events: &mut Vec<PupdateKind>) {
        let kind = match self {
            PupUpdate::SetInstallation(phase) => {
                let changed = record.installation != phase;
                record.installation = phase;
                changed.then_some(PupdateKind::InstallationChanged)
            }
            PupUpdate::SetConfig(values) => {
                record.config.extend(values);
                Some(PupdateKind::ConfigChanged)
            }
            PupUpdate::SetEnabled(enabled) => {
                let changed = record.enabled != enabled;
                record.enabled = enabled;
                changed.then_some(PupdateKind::EnabledChanged)
            }
            PupUpdate::SetNeedsConf(v) => {
                record.needs_conf = v;
                None
            }
            PupUpdate::SetNeedsDeps(v) => {
                record.needs_deps = v;
                None
            }
            PupUpdate::SetProvider {
                interface,
                provider,
            } => {
                record.providers.insert(interface, provider);
                Some(PupdateKind::ProvidersChanged)
            }
            PupUpdate::SetProviders(providers) => {
                record.providers = providers;
                Some(PupdateKind::ProvidersChanged)
            }
        };
        if let Some(kind) = kind
            && !events.contains(&kind)
        {
            events.push(kind);
        }
    }
}
