//! 外部日志分析器
//!
//! 每个分析器实现 LogAnalyzer；文本日志共用固定模式扫描：
//! `ERROR - <msg>`、`Exception: <msg>`（各取行尾）以及 Traceback 块（取块内首行后到空行前的内容）。

use std::path::Path;
use std::sync::OnceLock;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use regex::Regex;

use crate::core::AgentError;
use crate::recovery::types::StructuredError;

pub trait LogAnalyzer: Send + Sync {
    fn analyze(&self) -> Result<Vec<StructuredError>, AgentError>;

    fn source_name(&self) -> &str;
}

static ERROR_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn error_patterns() -> &'static [Regex] {
    ERROR_PATTERNS.get_or_init(|| {
        [
            r"ERROR\s+-\s+(.*)",
            r"Exception:\s+(.*)",
            r"(?s)Traceback.*?\n(.*?)\n\n",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid log pattern"))
        .collect()
    })
}

/// RFC 3339 形式的时间戳
pub fn rfc3339(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339()
}

/// 文件修改时间；取不到时为 None
pub fn file_mtime(path: &Path) -> Option<String> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(rfc3339)
        .ok()
}

/// 按固定模式扫描日志文本，每个匹配一条错误
pub fn scan_log_text(
    content: &str,
    source: &str,
    file: &str,
    timestamp: Option<&str>,
) -> Vec<StructuredError> {
    let mut errors = Vec::new();
    for pattern in error_patterns() {
        for caps in pattern.captures_iter(content) {
            let message = caps[1].trim();
            if message.is_empty() {
                continue;
            }
            let mut err = StructuredError::new(message, source);
            err.file = Some(file.to_string());
            err.timestamp = timestamp.map(str::to_string);
            errors.push(err);
        }
    }
    errors
}

/// 扫描单个日志文件；读取失败只记日志，不贡献错误
pub fn scan_log_file(path: &Path, source: &str) -> Vec<StructuredError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "failed to read log file");
            return Vec::new();
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let mtime = file_mtime(path);
    scan_log_text(&content, source, &path.display().to_string(), mtime.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_patterns_take_rest_of_line() {
        let log = "2024-01-01 INFO - started\n2024-01-01 ERROR - index out of range\nnext line\nCaused by: Exception: disk full\n";
        let errors = scan_log_text(log, "ide", "idea.log", Some("2024-01-01T00:00:00+00:00"));
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["index out of range", "disk full"]);
        assert!(errors.iter().all(|e| e.origin == "ide"));
        assert_eq!(errors[0].file.as_deref(), Some("idea.log"));
    }

    #[test]
    fn test_traceback_block() {
        let log = "Traceback (most recent call last):\n  File \"a.py\", line 1, in <module>\n\nrest";
        let errors = scan_log_text(log, "ide", "x.log", None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "File \"a.py\", line 1, in <module>");
    }

    #[test]
    fn test_unreadable_file_contributes_nothing() {
        assert!(scan_log_file(Path::new("/nonexistent/desk-agent/idea.log"), "ide").is_empty());
    }
}
