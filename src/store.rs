// Durable per-pup records: one JSON file each, written via temp file + rename.

use crate::error::{PupError, PupResult};
use crate::models::{PupId, PupRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

const RECORD_PREFIX: &str = "pup_";
const RECORD_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct PupStore {
    dir: PathBuf,
}

impl PupStore {
    pub fn open(dir: impl Into<PathBuf>) -> PupResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{RECORD_PREFIX}{id}.{RECORD_EXT}"))
    }

    /// Write the full record atomically. Blocking; see [`PupStore::save_async`].
    pub fn save(&self, record: &PupRecord) -> PupResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.record_path(&record.id))
            .map_err(|e| PupError::Io(e.error))?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(repo = "pup_store", operation = "save", pup_id = %record.id))]
    pub async fn save_async(&self, record: &PupRecord) -> PupResult<()> {
        let store = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.save(&record)).await?
    }

    /// Remove the stored record. Missing files are not an error.
    #[instrument(skip(self), fields(repo = "pup_store", operation = "delete"))]
    pub fn delete(&self, id: &PupId) -> PupResult<()> {
        match std::fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every record. Unreadable files are skipped with a warning so one
    /// corrupt record does not keep the rest of the fleet from starting.
    #[instrument(skip(self), fields(repo = "pup_store", operation = "load_all"))]
    pub fn load_all(&self) -> PupResult<Vec<PupRecord>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(RECORD_PREFIX))
                && path.extension().is_some_and(|e| e == RECORD_EXT);
            if !is_record {
                continue;
            }
            let parsed = std::fs::read(&path)
                .map_err(PupError::from)
                .and_then(|bytes| serde_json::from_slice::<PupRecord>(&bytes).map_err(Into::into));
            match parsed {
                Ok(record) => out.push(record),
                Err(e) => warn!(
                    error = %e,
                    path = %path.display(),
                    operation = "load_record",
                    "skipping unreadable pup record"
                ),
            }
        }
        out.sort_by(|a, b| a.ip.cmp(&b.ip));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn record(id: &str, ip: Ipv4Addr) -> PupRecord {
        PupRecord {
            id: id.into(),
            installation: InstallationPhase::Installing,
            enabled: false,
            config: HashMap::new(),
            ip,
            web_uis: vec![],
            providers: HashMap::new(),
            manifest: PupManifest {
                meta: ManifestMeta {
                    name: "core".into(),
                    version: "1.0.0".into(),
                    description: String::new(),
                },
                container: ManifestContainer::default(),
                interfaces: vec![],
                dependencies: vec![],
                config: vec![],
                metrics: vec![],
            },
            source: PupSource {
                source_id: "local".into(),
                location: "/tmp".into(),
            },
            needs_conf: false,
            needs_deps: false,
        }
    }

    #[test]
    fn save_then_load_all_returns_records_sorted_by_ip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PupStore::open(dir.path()).unwrap();
        store.save(&record("b", Ipv4Addr::new(10, 69, 0, 3))).unwrap();
        store.save(&record("a", Ipv4Addr::new(10, 69, 0, 2))).unwrap();

        let loaded = store.load_all().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn save_overwrites_existing_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PupStore::open(dir.path()).unwrap();
        let mut r = record("a", Ipv4Addr::new(10, 69, 0, 2));
        store.save(&r).unwrap();
        r.enabled = true;
        store.save(&r).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].enabled);
    }

    #[test]
    fn load_all_skips_corrupt_and_foreign_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PupStore::open(dir.path()).unwrap();
        store.save(&record("a", Ipv4Addr::new(10, 69, 0, 2))).unwrap();
        std::fs::write(dir.path().join("pup_broken.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "a");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PupStore::open(dir.path()).unwrap();
        store.save(&record("a", Ipv4Addr::new(10, 69, 0, 2))).unwrap();
        store.delete(&"a".to_string()).unwrap();
        store.delete(&"a".to_string()).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
