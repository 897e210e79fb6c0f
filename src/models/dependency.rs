// Dependency reports returned by the resolver

use serde::{Deserialize, Serialize};

use super::{DefaultSource, PupId};

/// A not-yet-installed pup from a catalog that could satisfy a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallableProvider {
    pub source_id: String,
    pub pup_name: String,
    pub pup_version: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReport {
    pub interface: String,
    pub version: String,
    pub optional: bool,
    pub current_provider: Option<PupId>,
    pub installed_providers: Vec<PupId>,
    pub installable_providers: Vec<InstallableProvider>,
    pub default_source: Option<DefaultSource>,
    /// Set when this entry could not be resolved (e.g. malformed range).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
