//! Agent 错误类型与运行结果
//!
//! 与 AgentLoop 配合：执行器层错误先经重试，重试耗尽后以 ActionFailed 上抛并触发自愈子循环；
//! MalformedPlan / NoActionableError / PatchApplyFailed 为终止性错误。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（规划、命令、执行器、日志分析、补丁等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Malformed plan: {0}")]
    MalformedPlan(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Hotkey {keys} is not allowed; allowed hotkeys: {allowed}")]
    ForbiddenHotkey { keys: String, allowed: String },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Image {0} not found on screen")]
    ImageNotFound(String),

    #[error("Action `{action}` is missing required argument `{arg}`")]
    MissingArgument { action: String, arg: String },

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Failed to focus window: {0}")]
    FocusFailed(String),

    #[error("Desktop backend error: {0}")]
    Backend(String),

    /// 执行器外层重试耗尽后包装原始错误；trace 为最后一次失败处捕获的堆栈
    #[error("Action `{action}` failed after {attempts} attempts: {source}")]
    ActionFailed {
        action: String,
        attempts: usize,
        #[source]
        source: Box<AgentError>,
        trace: Option<String>,
    },

    #[error("History step {step} is not after last recorded step {last}")]
    HistoryOrder { step: usize, last: usize },

    #[error("Log source not found: {0}")]
    LogSourceNotFound(String),

    #[error("Unsupported log format: {0}")]
    UnsupportedLogFormat(String),

    #[error("Log parse error: {0}")]
    LogParse(String),

    #[error("No actionable error could be extracted from the failure")]
    NoActionableError,

    #[error("Patch apply failed: {0}")]
    PatchApplyFailed(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// 终止性错误：不进入本地恢复，直接结束本次运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::MalformedPlan(_)
                | AgentError::NoActionableError
                | AgentError::PatchApplyFailed(_)
        )
    }

    /// 沿 source 链拼接完整错误信息（用于故障报告的最后一行）
    pub fn chain_message(&self) -> String {
        let mut msg = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            let text = err.to_string();
            if !msg.contains(&text) {
                msg.push_str(": ");
                msg.push_str(&text);
            }
            current = err.source();
        }
        msg
    }
}

/// 在调用处捕获堆栈文本；名称含 `trace_capture` 的帧在堆栈分析时被跳过
pub fn trace_capture_here() -> String {
    std::backtrace::Backtrace::force_capture().to_string()
}

/// AgentLoop 正常结束时的结果；中止走 Err(AgentError)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// 收到 FINISH（执行器或预言机给出 finish）
    Finished { steps: usize },
    /// 计划耗尽且未触发重新规划
    PlanExhausted { steps: usize },
    /// 达到 max_steps
    StepLimitReached { steps: usize },
    /// 补丁已全部应用，宿主应以相同参数重启进程
    RestartRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(AgentError::MalformedPlan("x".into()).is_fatal());
        assert!(AgentError::NoActionableError.is_fatal());
        assert!(AgentError::PatchApplyFailed("x".into()).is_fatal());
        assert!(!AgentError::InvalidCommand("x".into()).is_fatal());
        assert!(!AgentError::UnknownAction("x".into()).is_fatal());
    }

    #[test]
    fn test_chain_message_includes_source() {
        let err = AgentError::ActionFailed {
            action: "click_image".into(),
            attempts: 3,
            source: Box::new(AgentError::ImageNotFound("ok.png".into())),
            trace: None,
        };
        let msg = err.chain_message();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("ok.png"));
    }
}
