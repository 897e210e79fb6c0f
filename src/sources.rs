// Pup catalogs ("sources"): where installable manifests come from

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use crate::config::SourceConfig;
use crate::models::PupManifest;

const MANIFEST_FILE: &str = "manifest.json";

/// One installable pup offered by a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePup {
    pub name: String,
    pub version: String,
    pub location: String,
    pub manifest: PupManifest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceList {
    pub source_id: String,
    pub location: String,
    pub pups: Vec<SourcePup>,
}

#[async_trait]
pub trait SourceManager: Send + Sync {
    /// All configured catalogs. Cached lists are returned unless `force_refresh`.
    async fn list_all(&self, force_refresh: bool) -> anyhow::Result<Vec<SourceList>>;
}

/// Fixed catalog set, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticSources {
    lists: Vec<SourceList>,
}

impl StaticSources {
    pub fn new(lists: Vec<SourceList>) -> Self {
        Self { lists }
    }
}

#[async_trait]
impl SourceManager for StaticSources {
    async fn list_all(&self, _force_refresh: bool) -> anyhow::Result<Vec<SourceList>> {
        Ok(self.lists.clone())
    }
}

/// Catalogs on local disk: each configured directory holds `<pup>/manifest.json`.
pub struct DiskSourceManager {
    sources: Vec<SourceConfig>,
    cache: RwLock<Option<Vec<SourceList>>>,
}

impl DiskSourceManager {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self {
            sources,
            cache: RwLock::new(None),
        }
    }

    fn scan(sources: &[SourceConfig]) -> Vec<SourceList> {
        sources
            .iter()
            .map(|source| SourceList {
                source_id: source.id.clone(),
                location: source.path.display().to_string(),
                pups: Self::scan_dir(&source.path),
            })
            .collect()
    }

    fn scan_dir(root: &Path) -> Vec<SourcePup> {
        let entries = match std::fs::read_dir(root) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, path = %root.display(), "catalog directory unreadable");
                return vec![];
            }
        };
        let mut pups = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            let manifest = std::fs::read(&manifest_path)
                .map_err(anyhow::Error::from)
                .and_then(|b| serde_json::from_slice::<PupManifest>(&b).map_err(Into::into));
            match manifest {
                Ok(manifest) => pups.push(SourcePup {
                    name: manifest.meta.name.clone(),
                    version: manifest.meta.version.clone(),
                    location: dir.display().to_string(),
                    manifest,
                }),
                Err(e) => warn!(
                    error = %e,
                    path = %manifest_path.display(),
                    "skipping invalid manifest"
                ),
            }
        }
        pups.sort_by(|a, b| a.name.cmp(&b.name));
        pups
    }
}

#[async_trait]
impl SourceManager for DiskSourceManager {
    #[instrument(skip(self), fields(repo = "sources", operation = "list_all"))]
    async fn list_all(&self, force_refresh: bool) -> anyhow::Result<Vec<SourceList>> {
        if !force_refresh && let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let sources = self.sources.clone();
        let lists = tokio::task::spawn_blocking(move || Self::scan(&sources)).await?;
        *self.cache.write().await = Some(lists.clone());
        Ok(lists)
    }
}
