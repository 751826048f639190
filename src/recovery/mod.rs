//! 自愈子循环的组成部分
//!
//! 错误提取（堆栈 / 外部日志）→ 补丁合成 → git 应用与提交；重启由宿主进程完成。

pub mod ide;
pub mod log_analyzer;
pub mod registry;
pub mod synthesizer;
pub mod tabular;
pub mod trace;
pub mod types;
pub mod vcs;

use std::path::PathBuf;

use serde::Deserialize;

pub use ide::IdeLogAnalyzer;
pub use log_analyzer::LogAnalyzer;
pub use registry::{build_analyzer, build_analyzers, AnalyzerSpec};
pub use synthesizer::{diff_target, PatchSynthesizer};
pub use tabular::TabularLogAnalyzer;
pub use trace::TraceAnalyzer;
pub use types::{PatchSuggestion, StructuredError};
pub use vcs::{GitCli, VersionControl};

pub const DEFAULT_COMMIT_MESSAGE: &str = "auto-fix by LLM";

/// [recovery] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    /// 关闭后执行器错误直接中止运行
    pub enabled: bool,
    pub analyzers: Vec<AnalyzerSpec>,
    pub commit_message: String,
    pub backup_suffix: String,
    /// 补丁应用目录（git 仓库根），默认当前目录
    pub working_dir: Option<PathBuf>,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            analyzers: Vec::new(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            backup_suffix: ".orig".to_string(),
            working_dir: None,
        }
    }
}

impl RecoverySettings {
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
