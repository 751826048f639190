//! IDE（PyCharm）日志分析器
//!
//! 未显式指定目录时按固定顺序在常见位置查找 `PyCharm*` 日志目录，第一个存在的位置胜出；
//! 同一位置匹配多个版本时取字典序最大的（通常是最新版本）。扫描目录下所有 `*.log`。

use std::path::{Path, PathBuf};

use crate::core::AgentError;
use crate::recovery::log_analyzer::{scan_log_file, LogAnalyzer};
use crate::recovery::types::StructuredError;

pub const IDE_SOURCE: &str = "ide";

pub struct IdeLogAnalyzer {
    log_dir: Option<PathBuf>,
}

impl IdeLogAnalyzer {
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self { log_dir }
    }

    /// 候选目录 glob（按优先级）
    pub fn candidate_patterns() -> Vec<String> {
        let mut patterns = Vec::new();
        if let Ok(appdata) = std::env::var("APPDATA") {
            patterns.push(
                Path::new(&appdata)
                    .join("JetBrains")
                    .join("PyCharm*")
                    .join("log")
                    .display()
                    .to_string(),
            );
        }
        if let Some(home) = dirs::home_dir() {
            patterns.push(
                home.join(".cache/JetBrains/PyCharm*/log")
                    .display()
                    .to_string(),
            );
            patterns.push(
                home.join("Library/Logs/JetBrains/PyCharm*")
                    .display()
                    .to_string(),
            );
        }
        patterns
    }

    fn resolve_log_dir(&self) -> Result<PathBuf, AgentError> {
        if let Some(dir) = &self.log_dir {
            return if dir.is_dir() {
                Ok(dir.clone())
            } else {
                Err(AgentError::LogSourceNotFound(dir.display().to_string()))
            };
        }

        let patterns = Self::candidate_patterns();
        for pattern in &patterns {
            let Ok(paths) = glob::glob(pattern) else {
                continue;
            };
            let newest = paths.filter_map(Result::ok).filter(|p| p.is_dir()).max();
            if let Some(dir) = newest {
                return Ok(dir);
            }
        }
        Err(AgentError::LogSourceNotFound(format!(
            "no IDE log directory, tried: {}",
            patterns.join(", ")
        )))
    }
}

impl LogAnalyzer for IdeLogAnalyzer {
    fn analyze(&self) -> Result<Vec<StructuredError>, AgentError> {
        let dir = self.resolve_log_dir()?;
        let pattern = dir.join("*.log").display().to_string();
        let mut files: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| AgentError::LogParse(e.to_string()))?
            .filter_map(Result::ok)
            .collect();
        files.sort();

        let errors: Vec<StructuredError> = files
            .iter()
            .flat_map(|f| scan_log_file(f, IDE_SOURCE))
            .collect();
        tracing::info!(dir = %dir.display(), files = files.len(), errors = errors.len(), "ide logs scanned");
        Ok(errors)
    }

    fn source_name(&self) -> &str {
        IDE_SOURCE
    }
}
