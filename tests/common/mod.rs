// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use pupd::action_log::ActionLogger;
use pupd::config::AllocationConfig;
use pupd::models::*;
use pupd::monitor::MonitorService;
use pupd::patch::Rebuilder;
use pupd::pup_manager::{ManagerConfig, ManagerDeps, PupManager};
use pupd::sources::{SourceList, SourceManager, StaticSources};
use pupd::store::PupStore;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn manifest(name: &str, version: &str) -> PupManifest {
    PupManifest {
        meta: ManifestMeta {
            name: name.into(),
            version: version.into(),
            description: String::new(),
        },
        container: ManifestContainer {
            services: vec![ManifestService {
                name: "main".into(),
                command: format!("/bin/{name}"),
            }],
            exposes: vec![],
        },
        interfaces: vec![],
        dependencies: vec![],
        config: vec![],
        metrics: vec![],
    }
}

pub fn web_ui(name: &str, port: u16) -> ManifestExpose {
    ManifestExpose {
        name: name.into(),
        kind: ExposeKind::Http,
        port,
        web_ui: true,
        listen_on_host: false,
    }
}

pub fn host_port(name: &str, port: u16) -> ManifestExpose {
    ManifestExpose {
        name: name.into(),
        kind: ExposeKind::Tcp,
        port,
        web_ui: false,
        listen_on_host: true,
    }
}

pub fn interface(name: &str, version: &str) -> ManifestInterface {
    ManifestInterface {
        name: name.into(),
        version: version.into(),
        permission_groups: vec![],
    }
}

pub fn dependency(interface: &str, range: &str, optional: bool) -> ManifestDependency {
    ManifestDependency {
        interface_name: interface.into(),
        interface_version: range.into(),
        optional,
        default_source: None,
    }
}

pub fn required_field(name: &str) -> ManifestConfigField {
    ManifestConfigField {
        name: name.into(),
        label: name.into(),
        kind: "text".into(),
        required: true,
    }
}

pub fn source(id: &str) -> PupSource {
    PupSource {
        source_id: id.into(),
        location: format!("/catalogs/{id}"),
    }
}

pub fn manager_config() -> ManagerConfig {
    ManagerConfig {
        allocation: AllocationConfig::default(),
        metric_buffer_size: 8,
        subscriber_capacity: 4,
    }
}

/// Records every call the manager makes to its monitor.
#[derive(Default)]
pub struct FakeMonitor {
    pub watched: Mutex<Vec<ServiceId>>,
    pub fast_polls: Mutex<Vec<ServiceId>>,
}

#[async_trait]
impl MonitorService for FakeMonitor {
    async fn watch(&self, services: Vec<ServiceId>) {
        *self.watched.lock().unwrap() = services;
    }

    async fn fast_poll(&self, service: ServiceId) {
        self.fast_polls.lock().unwrap().push(service);
    }
}

/// Catalog collaborator that is always down.
pub struct FailingSources;

#[async_trait]
impl SourceManager for FailingSources {
    async fn list_all(&self, _force_refresh: bool) -> anyhow::Result<Vec<SourceList>> {
        anyhow::bail!("catalog host unreachable")
    }
}

pub async fn open_manager_with(
    dir: &Path,
    config: ManagerConfig,
    sources: Arc<dyn SourceManager>,
    monitor: Option<Arc<dyn MonitorService>>,
) -> Arc<PupManager> {
    PupManager::load(
        ManagerDeps {
            store: PupStore::open(dir).unwrap(),
            sources,
            monitor,
        },
        config,
    )
    .await
    .unwrap()
}

pub async fn open_manager(dir: &Path) -> Arc<PupManager> {
    open_manager_with(
        dir,
        manager_config(),
        Arc::new(StaticSources::default()),
        None,
    )
    .await
}

/// Rebuilder that succeeds or fails on demand and counts calls.
#[derive(Default)]
pub struct ScriptedRebuilder {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedRebuilder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rebuilder for ScriptedRebuilder {
    async fn rebuild(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("switch-to-configuration exited with status 1");
        }
        Ok(())
    }
}

/// Captures action events as `"<kind>:<payload>"` strings.
#[derive(Default)]
pub struct RecordingLogger {
    pub events: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ActionLogger for RecordingLogger {
    fn step(&self, _action_id: &str, step: &str) {
        self.events.lock().unwrap().push(format!("step:{step}"));
    }

    fn log(&self, _action_id: &str, message: &str) {
        self.events.lock().unwrap().push(format!("log:{message}"));
    }

    fn error(&self, _action_id: &str, message: &str) {
        self.events.lock().unwrap().push(format!("error:{message}"));
    }

    fn progress(&self, _action_id: &str, percent: u8) {
        self.events.lock().unwrap().push(format!("progress:{percent}"));
    }
}

/// Read every file under `dir` into a sorted (relative path, bytes) list.
pub fn tree_contents(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out: Vec<(String, Vec<u8>)> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect();
    out.sort();
    out
}
