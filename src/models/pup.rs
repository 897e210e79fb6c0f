// Persisted pup record

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::PupManifest;

pub type PupId = String;

/// Installation phase; serializes lowercase (e.g. "installing").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationPhase {
    Installing,
    Ready,
    Unready,
    Uninstalling,
    Uninstalled,
    Broken,
}

/// Where a pup was adopted from. Together with the manifest name and version
/// this is the identity used to reject duplicate adoptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupSource {
    pub source_id: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebUiBinding {
    pub name: String,
    pub internal_port: u16,
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupRecord {
    pub id: PupId,
    pub installation: InstallationPhase,
    pub enabled: bool,
    #[serde(default)]
    pub config: HashMap<String, String>,
    pub ip: Ipv4Addr,
    #[serde(default)]
    pub web_uis: Vec<WebUiBinding>,
    /// Interface name -> ID of the pup selected to provide it.
    #[serde(default)]
    pub providers: HashMap<String, PupId>,
    pub manifest: PupManifest,
    pub source: PupSource,
    #[serde(default)]
    pub needs_conf: bool,
    #[serde(default)]
    pub needs_deps: bool,
}

impl PupRecord {
    pub fn name(&self) -> &str {
        &self.manifest.meta.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.meta.version
    }

    /// True when `manifest` + `source` describe the same package as this record.
    pub fn is_same_package(&self, manifest: &PupManifest, source: &PupSource) -> bool {
        self.name() == manifest.meta.name
            && self.version() == manifest.meta.version
            && self.source.source_id == source.source_id
    }

    /// Every host port this record holds: allocated UI ports plus host-bound exposes.
    pub fn bound_host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.web_uis
            .iter()
            .map(|w| w.host_port)
            .chain(self.manifest.host_ports())
    }
}
