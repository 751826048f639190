//! 表格日志分析器（CSV / Excel / ODS）
//!
//! 需要显式文件路径；读取 `Error` 列，每个非空单元格一条错误。
//! 没有 `Error` 列时返回空结果；`Timestamp` 列存在则作为时间戳，否则用文件修改时间。

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};

use crate::core::AgentError;
use crate::recovery::log_analyzer::{file_mtime, LogAnalyzer};
use crate::recovery::types::StructuredError;

pub const TABULAR_SOURCE: &str = "tabular";

const ERROR_COLUMN: &str = "Error";
const TIMESTAMP_COLUMN: &str = "Timestamp";
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "ods"];

pub struct TabularLogAnalyzer {
    path: Option<PathBuf>,
}

impl TabularLogAnalyzer {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

/// 表头 + 行（均已转为字符串）
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_csv(path: &Path) -> Result<Table, AgentError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AgentError::LogParse(format!("{}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| AgentError::LogParse(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AgentError::LogParse(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

/// 读取第一个工作表
fn read_workbook(path: &Path) -> Result<Table, AgentError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AgentError::LogParse(format!("{}: {e}", path.display())))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Table {
            headers: Vec::new(),
            rows: Vec::new(),
        });
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AgentError::LogParse(format!("{sheet}: {e}")))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
    let headers = rows
        .next()
        .map(|h| h.into_iter().map(|c| c.trim().to_string()).collect())
        .unwrap_or_default();
    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}

impl LogAnalyzer for TabularLogAnalyzer {
    fn analyze(&self) -> Result<Vec<StructuredError>, AgentError> {
        let path = self.path.as_deref().ok_or_else(|| {
            AgentError::LogSourceNotFound("tabular analyzer requires an explicit file path".into())
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ext != "csv" && !WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AgentError::UnsupportedLogFormat(format!(".{ext}")));
        }
        if !path.is_file() {
            return Err(AgentError::LogSourceNotFound(path.display().to_string()));
        }

        let table = if ext == "csv" {
            read_csv(path)?
        } else {
            read_workbook(path)?
        };

        let Some(error_idx) = table.headers.iter().position(|h| h == ERROR_COLUMN) else {
            tracing::info!(file = %path.display(), "no Error column, nothing to extract");
            return Ok(Vec::new());
        };
        let ts_idx = table.headers.iter().position(|h| h == TIMESTAMP_COLUMN);
        let mtime = file_mtime(path);
        let file = path.display().to_string();

        let errors = table
            .rows
            .iter()
            .filter_map(|row| {
                let message = row.get(error_idx)?.trim();
                if message.is_empty() {
                    return None;
                }
                let mut err = StructuredError::new(message, TABULAR_SOURCE);
                err.file = Some(file.clone());
                err.timestamp = ts_idx
                    .and_then(|i| row.get(i))
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .or_else(|| mtime.clone());
                Some(err)
            })
            .collect();
        Ok(errors)
    }

    fn source_name(&self) -> &str {
        TABULAR_SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_path_and_supported_extension() {
        let err = TabularLogAnalyzer::new(None).analyze().unwrap_err();
        assert!(matches!(err, AgentError::LogSourceNotFound(_)));

        let err = TabularLogAnalyzer::new(Some(PathBuf::from("run.json")))
            .analyze()
            .unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedLogFormat(ref e) if e == ".json"));
    }

    #[test]
    fn test_timestamp_column_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        std::fs::write(&path, "Timestamp,Error\n2024-05-01T10:00:00Z,timeout\n,crash\n").unwrap();

        let errors = TabularLogAnalyzer::new(Some(path)).analyze().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert!(errors[1].timestamp.is_some());
        assert_ne!(errors[1].timestamp.as_deref(), Some(""));
    }
}
