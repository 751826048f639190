//! 版本控制：应用补丁、暂存、提交；任何失败都是 PatchApplyFailed

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::AgentError;

#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn apply(&self, diff_path: &Path) -> Result<(), AgentError>;

    async fn stage(&self, file: &Path) -> Result<(), AgentError>;

    async fn commit(&self, message: &str) -> Result<(), AgentError>;
}

/// 调用 `git` 命令行（在 working_dir 下执行）
pub struct GitCli {
    working_dir: PathBuf,
}

impl GitCli {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, AgentError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| AgentError::PatchApplyFailed(format!("Failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::PatchApplyFailed(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn apply(&self, diff_path: &Path) -> Result<(), AgentError> {
        let path = diff_path.display().to_string();
        self.git(&["apply", &path]).await.map(|_| ())
    }

    async fn stage(&self, file: &Path) -> Result<(), AgentError> {
        let path = file.display().to_string();
        self.git(&["add", "--", &path]).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<(), AgentError> {
        let out = self.git(&["commit", "-m", message]).await?;
        tracing::info!(summary = %out.lines().next().unwrap_or_default(), "patch committed");
        Ok(())
    }
}
