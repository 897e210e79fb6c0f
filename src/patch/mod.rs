// Transactional configuration patch: stage writes, snapshot the live config
// directory, apply, rebuild, and restore the snapshot if anything fails.
//
//   pending -> applying -> applied
//   pending -> cancelled
//   applying -> rolling_back -> errored
//   applying -> errored            (snapshot failed; nothing touched)

mod fs;
mod rebuild;
pub mod render;

pub use rebuild::{CommandRebuilder, Rebuilder};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::action_log::ActionLogger;
use crate::error::PatchError;
use crate::models::PupId;

const NETWORK_FILE: &str = "network.nix";
const FIREWALL_FILE: &str = "firewall.nix";
const CONTAINERS_FILE: &str = "system_container.nix";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchState {
    Pending,
    Applying,
    Applied,
    Cancelled,
    RollingBack,
    Errored,
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchState::Pending => "pending",
            PatchState::Applying => "applying",
            PatchState::Applied => "applied",
            PatchState::Cancelled => "cancelled",
            PatchState::RollingBack => "rolling_back",
            PatchState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// One staged change to the config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    WritePupFile { pup_id: PupId, contents: String },
    RemovePupFile { pup_id: PupId },
    UpdateNetwork { contents: String },
    UpdateFirewall { contents: String },
    UpdateSystemContainers { contents: String },
}

pub fn pup_file_name(pup_id: &str) -> String {
    format!("pup_{pup_id}.nix")
}

impl PatchOp {
    fn name(&self) -> String {
        match self {
            PatchOp::WritePupFile { pup_id, .. } => format!("write pup file {pup_id}"),
            PatchOp::RemovePupFile { pup_id } => format!("remove pup file {pup_id}"),
            PatchOp::UpdateNetwork { .. } => "update network".into(),
            PatchOp::UpdateFirewall { .. } => "update firewall".into(),
            PatchOp::UpdateSystemContainers { .. } => "update system containers".into(),
        }
    }

    fn perform(&self, config_dir: &Path) -> std::io::Result<()> {
        match self {
            PatchOp::WritePupFile { pup_id, contents } => {
                fs::write_atomic(&config_dir.join(pup_file_name(pup_id)), contents)
            }
            PatchOp::RemovePupFile { pup_id } => {
                fs::remove_if_exists(&config_dir.join(pup_file_name(pup_id)))
            }
            PatchOp::UpdateNetwork { contents } => {
                fs::write_atomic(&config_dir.join(NETWORK_FILE), contents)
            }
            PatchOp::UpdateFirewall { contents } => {
                fs::write_atomic(&config_dir.join(FIREWALL_FILE), contents)
            }
            PatchOp::UpdateSystemContainers { contents } => {
                fs::write_atomic(&config_dir.join(CONTAINERS_FILE), contents)
            }
        }
    }
}

/// Hands out patches that share one config directory and rebuild command.
#[derive(Clone)]
pub struct Patcher {
    config_dir: PathBuf,
    snapshot_dir: PathBuf,
    rebuilder: Arc<dyn Rebuilder>,
    logger: Arc<dyn ActionLogger>,
}

impl Patcher {
    pub fn new(
        config_dir: impl Into<PathBuf>,
        snapshot_dir: impl Into<PathBuf>,
        rebuilder: Arc<dyn Rebuilder>,
        logger: Arc<dyn ActionLogger>,
    ) -> std::io::Result<Self> {
        let config_dir = config_dir.into();
        let snapshot_dir = snapshot_dir.into();
        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(&snapshot_dir)?;
        Ok(Self {
            config_dir,
            snapshot_dir,
            rebuilder,
            logger,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Open a new pending patch; `action_id` correlates its progress events.
    pub fn new_patch(&self, action_id: impl Into<String>) -> ConfigPatch {
        ConfigPatch {
            action_id: action_id.into(),
            config_dir: self.config_dir.clone(),
            snapshot_root: self.snapshot_dir.clone(),
            ops: Vec::new(),
            state: PatchState::Pending,
            snapshot_path: None,
            last_error: None,
            rebuilder: self.rebuilder.clone(),
            logger: self.logger.clone(),
        }
    }
}

pub struct ConfigPatch {
    action_id: String,
    config_dir: PathBuf,
    snapshot_root: PathBuf,
    ops: Vec<PatchOp>,
    state: PatchState,
    snapshot_path: Option<PathBuf>,
    last_error: Option<String>,
    rebuilder: Arc<dyn Rebuilder>,
    logger: Arc<dyn ActionLogger>,
}

impl fmt::Debug for ConfigPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigPatch")
            .field("action_id", &self.action_id)
            .field("state", &self.state)
            .field("ops", &self.ops.len())
            .field("snapshot_path", &self.snapshot_path)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl ConfigPatch {
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn state(&self) -> PatchState {
        self.state
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stage(&mut self, op: PatchOp) -> Result<(), PatchError> {
        if self.state != PatchState::Pending {
            return Err(PatchError::AlreadyFinalized(self.state));
        }
        self.ops.push(op);
        Ok(())
    }

    /// Abort a pending patch without touching the filesystem.
    pub fn cancel(&mut self) -> Result<(), PatchError> {
        if self.state != PatchState::Pending {
            return Err(PatchError::AlreadyFinalized(self.state));
        }
        self.ops.clear();
        self.state = PatchState::Cancelled;
        self.logger.log(&self.action_id, "patch cancelled");
        Ok(())
    }

    /// Snapshot, perform staged ops in order, rebuild. Any failure after the
    /// snapshot restores the live directory from it. Not cancellable.
    #[instrument(skip(self), fields(operation = "apply_patch", action_id = %self.action_id, ops = self.ops.len()))]
    pub async fn apply(&mut self) -> Result<(), PatchError> {
        if self.state != PatchState::Pending {
            return Err(PatchError::AlreadyFinalized(self.state));
        }
        self.state = PatchState::Applying;
        self.logger.step(&self.action_id, "snapshot");

        let snapshot = self.snapshot_root.join(format!(
            "patch-{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            hex::encode(rand::random::<[u8; 4]>())
        ));
        let copy = {
            let live = self.config_dir.clone();
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || fs::copy_dir(&live, &snapshot)).await
        };
        match copy {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.state = PatchState::Errored;
                self.last_error = Some(format!("snapshot failed: {e}"));
                self.logger.error(&self.action_id, "snapshot failed");
                warn!(error = %e, "patch snapshot failed; live config untouched");
                return Err(PatchError::Snapshot(e));
            }
            Err(join) => {
                self.state = PatchState::Errored;
                self.last_error = Some(join.to_string());
                return Err(join.into());
            }
        }
        self.snapshot_path = Some(snapshot.clone());
        self.logger.progress(&self.action_id, 20);

        self.logger.step(&self.action_id, "write");
        let performed = {
            let ops = self.ops.clone();
            let live = self.config_dir.clone();
            tokio::task::spawn_blocking(move || {
                for (index, op) in ops.iter().enumerate() {
                    op.perform(&live).map_err(|source| PatchError::Operation {
                        index,
                        op: op.name(),
                        source,
                    })?;
                }
                Ok::<(), PatchError>(())
            })
            .await
        };
        let performed = match performed {
            Ok(r) => r,
            Err(join) => Err(join.into()),
        };
        if let Err(e) = performed {
            return Err(self.rollback(&snapshot, e).await);
        }
        self.logger.progress(&self.action_id, 50);

        self.logger.step(&self.action_id, "rebuild");
        if let Err(e) = self.rebuilder.rebuild().await {
            return Err(self
                .rollback(&snapshot, PatchError::Rebuild(format!("{e:#}")))
                .await);
        }

        self.state = PatchState::Applied;
        self.logger.progress(&self.action_id, 100);
        info!(snapshot = %snapshot.display(), "patch applied");
        Ok(())
    }

    /// Restore `snapshot` over the live directory. Returns the error the
    /// caller should see: `cause` on success, `RollbackFailed` otherwise.
    async fn rollback(&mut self, snapshot: &Path, cause: PatchError) -> PatchError {
        self.state = PatchState::RollingBack;
        self.logger.step(&self.action_id, "rollback");
        warn!(error = %cause, "patch failed; rolling back");

        let restored = {
            let live = self.config_dir.clone();
            let snapshot = snapshot.to_path_buf();
            tokio::task::spawn_blocking(move || fs::restore_dir(&snapshot, &live)).await
        };
        let restored = restored.unwrap_or_else(|join| Err(std::io::Error::other(join)));

        self.state = PatchState::Errored;
        match restored {
            Ok(()) => {
                self.last_error = Some(cause.to_string());
                self.logger.error(&self.action_id, &cause.to_string());
                cause
            }
            Err(rollback) => {
                let fatal = PatchError::RollbackFailed {
                    cause: cause.to_string(),
                    rollback,
                };
                self.last_error = Some(fatal.to_string());
                self.logger.error(&self.action_id, &fatal.to_string());
                error!(
                    error = %fatal,
                    config_dir = %self.config_dir.display(),
                    snapshot = %snapshot.display(),
                    "ROLLBACK FAILED: host configuration is in an unknown state"
                );
                fatal
            }
        }
    }
}
