// Rebuild collaborator: applies the staged on-disk config to the running OS

use async_trait::async_trait;
use tracing::{info, instrument};

#[async_trait]
pub trait Rebuilder: Send + Sync {
    /// Apply whatever is currently in the config directory. Must be safe to
    /// run again after a rollback.
    async fn rebuild(&self) -> anyhow::Result<()>;
}

/// Runs an external command (e.g. `nixos-rebuild switch`).
#[derive(Debug, Clone)]
pub struct CommandRebuilder {
    program: String,
    args: Vec<String>,
}

impl CommandRebuilder {
    pub fn new(command: &[String]) -> anyhow::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("rebuild command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Rebuilder for CommandRebuilder {
    #[instrument(skip(self), fields(operation = "rebuild", program = %self.program))]
    async fn rebuild(&self) -> anyhow::Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
        }
        info!("rebuild complete");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_rebuilder_reports_success() {
        let r = CommandRebuilder::new(&["true".to_string()]).unwrap();
        r.rebuild().await.unwrap();
    }

    #[tokio::test]
    async fn command_rebuilder_reports_failure_with_stderr() {
        let r = CommandRebuilder::new(&[
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ])
        .unwrap();
        let err = r.rebuild().await.unwrap_err().to_string();
        assert!(err.contains("boom"), "{err}");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandRebuilder::new(&[]).is_err());
    }
}
