//! 动作数据模型
//!
//! 预言机返回的原始命令形如 `{"action": "click", "args": {"x": 10, "y": 10}}`（`kind` 为 `action` 的别名），
//! 规范化与校验在原始 JSON 上进行，通过后再转为强类型 Action 交给执行器。

use std::fmt;

use serde_json::{Map, Value};

use crate::core::AgentError;

/// 原始命令（未规范化、未校验）
pub type RawCommand = Value;

/// 读取原始命令的动作名（`action` 优先，其次 `kind`）
pub fn command_kind(cmd: &RawCommand) -> Option<&str> {
    cmd.get("action")
        .or_else(|| cmd.get("kind"))
        .and_then(Value::as_str)
}

/// 原子动作种类；未内置的名称归为 Custom，由执行器的自定义动作表解析
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Click,
    ClickImage,
    TypeText,
    Hotkey,
    FocusWindow,
    Sleep,
    SaveFile,
    Finish,
    Custom(String),
}

impl ActionKind {
    /// 按名称解析，兼容旧命名（click_img / type / input_text）
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "move" => ActionKind::Move,
            "click" => ActionKind::Click,
            "click_image" | "click_img" => ActionKind::ClickImage,
            "type_text" | "type" | "input_text" => ActionKind::TypeText,
            "hotkey" => ActionKind::Hotkey,
            "focus_window" => ActionKind::FocusWindow,
            "sleep" => ActionKind::Sleep,
            "save_file" => ActionKind::SaveFile,
            "finish" => ActionKind::Finish,
            _ => ActionKind::Custom(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Click => "click",
            ActionKind::ClickImage => "click_image",
            ActionKind::TypeText => "type_text",
            ActionKind::Hotkey => "hotkey",
            ActionKind::FocusWindow => "focus_window",
            ActionKind::Sleep => "sleep",
            ActionKind::SaveFile => "save_file",
            ActionKind::Finish => "finish",
            ActionKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 强类型动作：种类 + 参数表
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub args: Map<String, Value>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            args: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// 从原始命令构造；缺少动作名或 args 非对象时返回 InvalidCommand
    pub fn from_command(cmd: &RawCommand) -> Result<Self, AgentError> {
        let name = command_kind(cmd)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AgentError::InvalidCommand(format!("missing action kind: {cmd}")))?;

        let args = match cmd.get("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(AgentError::InvalidCommand(format!(
                    "args must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            kind: ActionKind::parse(name),
            args,
        })
    }

    /// 还原为预言机可读的命令 JSON（写入历史、回放给预言机）
    pub fn to_command(&self) -> RawCommand {
        let mut obj = Map::new();
        obj.insert("action".into(), Value::String(self.kind.as_str().to_string()));
        if !self.args.is_empty() {
            obj.insert("args".into(), Value::Object(self.args.clone()));
        }
        Value::Object(obj)
    }

    /// 依次查找多个别名，返回第一个存在的参数
    pub fn arg(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .find_map(|n| self.args.get(*n))
            .filter(|v| !v.is_null())
    }

    pub fn arg_str(&self, names: &[&str]) -> Option<&str> {
        self.arg(names).and_then(Value::as_str)
    }

    /// 整数参数，兼容浮点与数字字符串
    pub fn arg_i64(&self, names: &[&str]) -> Option<i64> {
        match self.arg(names)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn arg_f64(&self, names: &[&str]) -> Option<f64> {
        match self.arg(names)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 必需的字符串参数
    pub fn require_str(&self, names: &[&str]) -> Result<&str, AgentError> {
        self.arg_str(names).ok_or_else(|| AgentError::MissingArgument {
            action: self.kind.to_string(),
            arg: names.first().copied().unwrap_or_default().to_string(),
        })
    }

    /// 必需的整数参数
    pub fn require_i64(&self, names: &[&str]) -> Result<i64, AgentError> {
        self.arg_i64(names).ok_or_else(|| AgentError::MissingArgument {
            action: self.kind.to_string(),
            arg: names.first().copied().unwrap_or_default().to_string(),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_command())
    }
}

/// 单步执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Ok,
    Finish,
    /// 带内错误：不触发自愈，只促使预言机重新规划
    Error(String),
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionResult::Error(_))
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Ok => f.write_str("OK"),
            ExecutionResult::Finish => f.write_str("FINISH"),
            ExecutionResult::Error(msg) => write!(f, "ERROR: {msg}"),
        }
    }
}
