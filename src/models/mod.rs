// Domain models: persisted pup records, manifests, runtime stats, reports

mod dependency;
mod events;
mod manifest;
mod monitor;
mod pup;
mod stats;

pub use dependency::{DependencyReport, InstallableProvider};
pub use events::{Pupdate, PupdateKind};
pub use manifest::{
    DefaultSource, ExposeKind, ManifestConfigField, ManifestContainer, ManifestDependency,
    ManifestExpose, ManifestInterface, ManifestMeta, ManifestMetric, ManifestService, PupManifest,
};
pub use monitor::{ProcStatus, ProcStatusSample, ServiceId};
pub use pup::{InstallationPhase, PupId, PupRecord, PupSource, WebUiBinding};
pub use stats::{FloatBuffer, PupIssues, PupRuntimeStats, PupStatus};
