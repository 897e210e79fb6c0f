// Dependency resolution: which installed or installable pups can provide
// each interface a pup depends on.

use semver::{Version, VersionReq};
use tracing::warn;

use crate::models::{
    DependencyReport, InstallableProvider, ManifestInterface, PupManifest, PupRecord,
};
use crate::sources::SourceList;

fn offers(manifest: &PupManifest, interface: &str, req: &VersionReq) -> bool {
    manifest
        .interfaces
        .iter()
        .any(|i| i.name == interface && satisfies(i, req))
}

fn satisfies(iface: &ManifestInterface, req: &VersionReq) -> bool {
    Version::parse(&iface.version).is_ok_and(|v| req.matches(&v))
}

/// Build one report per dependency declared by `record`.
///
/// A malformed range yields a bare entry annotated with the parse error
/// instead of failing the whole report. `catalogs` is `Err` when the
/// catalog collaborator could not be reached; each resolvable entry then
/// carries that message and no installable providers.
pub fn resolve(
    record: &PupRecord,
    installed: &[PupRecord],
    catalogs: Result<&[SourceList], &str>,
) -> Vec<DependencyReport> {
    let mut reports = Vec::with_capacity(record.manifest.dependencies.len());

    for dep in &record.manifest.dependencies {
        let mut report = DependencyReport {
            interface: dep.interface_name.clone(),
            version: dep.interface_version.clone(),
            optional: dep.optional,
            current_provider: None,
            installed_providers: vec![],
            installable_providers: vec![],
            default_source: None,
            error: None,
        };

        let req = match VersionReq::parse(&dep.interface_version) {
            Ok(req) => req,
            Err(e) => {
                warn!(
                    pup_id = %record.id,
                    interface = %dep.interface_name,
                    range = %dep.interface_version,
                    error = %e,
                    "invalid dependency version range"
                );
                report.error = Some(format!("invalid version range: {e}"));
                reports.push(report);
                continue;
            }
        };

        let installed_matches: Vec<&PupRecord> = installed
            .iter()
            .filter(|p| p.id != record.id && offers(&p.manifest, &dep.interface_name, &req))
            .collect();
        report.installed_providers = installed_matches.iter().map(|p| p.id.clone()).collect();

        match catalogs {
            Ok(lists) => {
                for list in lists {
                    for pup in &list.pups {
                        let already_installed = installed_matches.iter().any(|p| {
                            p.source.source_id == list.source_id && p.name() == pup.name
                        });
                        if already_installed
                            || !offers(&pup.manifest, &dep.interface_name, &req)
                        {
                            continue;
                        }
                        report.installable_providers.push(InstallableProvider {
                            source_id: list.source_id.clone(),
                            pup_name: pup.name.clone(),
                            pup_version: pup.version.clone(),
                            location: pup.location.clone(),
                        });
                    }
                }
            }
            Err(msg) => report.error = Some(format!("catalogs unavailable: {msg}")),
        }

        report.current_provider = record.providers.get(&dep.interface_name).cloned();
        report.default_source = dep.default_source.clone();
        reports.push(report);
    }

    reports
}
