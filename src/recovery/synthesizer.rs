//! 补丁合成与应用
//!
//! generate_suggestions：每条结构化错误一次预言机调用，得到统一 diff；
//! apply_optimizations：逐条校验、落盘、备份目标文件、apply/stage/commit，允许部分成功。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::core::AgentError;
use crate::oracle::{strip_code_fence, PlanningOracle};
use crate::recovery::types::{PatchSuggestion, StructuredError};
use crate::recovery::vcs::VersionControl;
use crate::recovery::RecoverySettings;

const DIFF_PROMPT: &str = "Generate a git unified diff that fixes the error below. \
Only modify the file that triggered the error. Reply with the diff only, no explanation.\n\nError:\n";

/// 头部行中的路径：`diff -u` 在 tab 之后附带时间戳，先截掉再取最后一个 token
fn header_path(line: &str) -> Option<&str> {
    line.split('\t').next()?.split_whitespace().last()
}

/// 从 diff 首行取目标路径，去掉 `a/` 前缀；
/// 新建文件（`/dev/null`）时改读 `+++` 行并去掉 `b/`
pub fn diff_target(diff: &str) -> Option<PathBuf> {
    let mut lines = diff.lines();
    let first = header_path(lines.next()?)?;
    if first != "/dev/null" {
        return Some(PathBuf::from(first.strip_prefix("a/").unwrap_or(first)));
    }
    let plus = header_path(lines.find(|l| l.starts_with("+++"))?)?;
    Some(PathBuf::from(plus.strip_prefix("b/").unwrap_or(plus)))
}

pub struct PatchSynthesizer {
    oracle: Arc<dyn PlanningOracle>,
    vcs: Arc<dyn VersionControl>,
    commit_message: String,
    backup_suffix: String,
    working_dir: PathBuf,
}

impl PatchSynthesizer {
    pub fn new(
        oracle: Arc<dyn PlanningOracle>,
        vcs: Arc<dyn VersionControl>,
        settings: &RecoverySettings,
    ) -> Self {
        Self {
            oracle,
            vcs,
            commit_message: settings.commit_message.clone(),
            backup_suffix: settings.backup_suffix.clone(),
            working_dir: settings.working_dir(),
        }
    }

    /// 每条错误一个建议；预言机失败不重试，直接中止
    pub async fn generate_suggestions(
        &self,
        errors: &[StructuredError],
    ) -> Result<Vec<PatchSuggestion>, AgentError> {
        let mut suggestions = Vec::with_capacity(errors.len());
        for error in errors {
            let serialized = serde_json::to_string_pretty(error)
                .map_err(|e| AgentError::Llm(format!("failed to serialize error: {e}")))?;
            let reply = self
                .oracle
                .generate_text(&format!("{DIFF_PROMPT}{serialized}\n"))
                .await?;
            let diff = strip_code_fence(&reply).trim().to_string();
            tracing::info!(origin = %error.origin, diff_len = diff.len(), "patch suggested");
            suggestions.push(PatchSuggestion {
                error: error.clone(),
                diff,
                origin: error.origin.clone(),
            });
        }
        Ok(suggestions)
    }

    /// 仅当至少尝试了一条且全部成功时返回 true
    pub async fn apply_optimizations(&self, suggestions: &[PatchSuggestion]) -> bool {
        let mut attempted = 0usize;
        let mut success = true;

        for suggestion in suggestions {
            if !suggestion.is_unified_diff() {
                tracing::warn!(origin = %suggestion.origin, "not a unified diff, skipped");
                continue;
            }
            attempted += 1;
            if let Err(e) = self.apply_one(&suggestion.diff).await {
                tracing::error!(error = %e, "patch application failed");
                success = false;
            }
        }

        attempted > 0 && success
    }

    async fn apply_one(&self, diff: &str) -> Result<(), AgentError> {
        let patch_file = write_patch_file(diff)?;
        let target = diff_target(diff)
            .ok_or_else(|| AgentError::PatchApplyFailed("diff has no target path".into()))?;

        let absolute = self.working_dir.join(&target);
        if absolute.is_file() {
            let backup = backup_path(&absolute, &self.backup_suffix);
            std::fs::copy(&absolute, &backup).map_err(|e| {
                AgentError::PatchApplyFailed(format!("backup of {} failed: {e}", absolute.display()))
            })?;
            tracing::info!(backup = %backup.display(), "target backed up");
        }

        self.vcs.apply(patch_file.path()).await?;
        self.vcs.stage(&target).await?;
        self.vcs.commit(&self.commit_message).await?;
        tracing::info!(file = %target.display(), "patch applied and committed");
        Ok(())
    }
}

fn write_patch_file(diff: &str) -> Result<NamedTempFile, AgentError> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("desk-agent-")
        .suffix(".patch")
        .tempfile()?;
    file.write_all(diff.as_bytes())?;
    if !diff.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(file)
}

fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
