// Change notifications ("pupdates") fanned out to subscribers

use serde::{Deserialize, Serialize};

use super::{InstallationPhase, PupId, PupRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PupdateKind {
    Adopted,
    InstallationChanged,
    ConfigChanged,
    EnabledChanged,
    ProvidersChanged,
    Purged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pupdate {
    pub id: PupId,
    pub kind: PupdateKind,
    /// Record after the change; `None` once purged.
    pub state: Option<PupRecord>,
}

impl Pupdate {
    pub fn new(kind: PupdateKind, state: &PupRecord) -> Self {
        Self {
            id: state.id.clone(),
            kind,
            state: Some(state.clone()),
        }
    }

    pub fn purged(id: PupId) -> Self {
        Self {
            id,
            kind: PupdateKind::Purged,
            state: None,
        }
    }

    pub fn installation(&self) -> Option<InstallationPhase> {
        self.state.as_ref().map(|s| s.installation)
    }
}
