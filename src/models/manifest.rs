// Pup manifest: static declaration shipped with each pup package

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupManifest {
    pub meta: ManifestMeta,
    #[serde(default)]
    pub container: ManifestContainer,
    #[serde(default)]
    pub interfaces: Vec<ManifestInterface>,
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
    #[serde(default)]
    pub config: Vec<ManifestConfigField>,
    #[serde(default)]
    pub metrics: Vec<ManifestMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMeta {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestContainer {
    #[serde(default)]
    pub services: Vec<ManifestService>,
    #[serde(default)]
    pub exposes: Vec<ManifestExpose>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestService {
    pub name: String,
    pub command: String,
}

/// Protocol of an exposed port; serializes lowercase ("http", "tcp").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposeKind {
    Http,
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestExpose {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExposeKind,
    pub port: u16,
    /// Shown in the dashboard; gets an allocated host port at adoption.
    #[serde(default)]
    pub web_ui: bool,
    /// Binds `port` directly on the host, so no other pup may claim it.
    #[serde(default)]
    pub listen_on_host: bool,
}

/// A capability this pup offers to others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInterface {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub permission_groups: Vec<String>,
}

/// A capability this pup requires from another pup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDependency {
    pub interface_name: String,
    pub interface_version: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default_source: Option<DefaultSource>,
}

/// Where the manifest author suggests getting a provider from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSource {
    pub source_location: String,
    pub pup_name: String,
    pub pup_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfigField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_field_kind")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

fn default_field_kind() -> String {
    "text".into()
}

/// Custom metric a pup reports on top of the built-in cpu/memory/disk set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetric {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_metric_kind")]
    pub kind: String,
}

fn default_metric_kind() -> String {
    "float".into()
}

impl PupManifest {
    /// Ports this manifest binds directly on the host.
    pub fn host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.container
            .exposes
            .iter()
            .filter(|e| e.listen_on_host)
            .map(|e| e.port)
    }

    pub fn web_ui_exposes(&self) -> impl Iterator<Item = &ManifestExpose> + '_ {
        self.container.exposes.iter().filter(|e| e.web_ui)
    }
}
