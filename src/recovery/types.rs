use serde::{Deserialize, Serialize};

/// 从堆栈或外部日志中提取的结构化错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// 出错帧后面的那行源码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    /// 来源：traceback / ide / tabular
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl StructuredError {
    pub fn new(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            file: None,
            line: None,
            function: None,
            code: None,
            message: message.into(),
            origin: origin.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSuggestion {
    pub error: StructuredError,
    pub diff: String,
    pub origin: String,
}

impl PatchSuggestion {
    /// 统一 diff 必须以 `---` 开头
    pub fn is_unified_diff(&self) -> bool {
        self.diff.starts_with("---")
    }
}
