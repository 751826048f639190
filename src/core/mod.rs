//! 核心层：错误类型、固定间隔重试、执行历史、主控循环

pub mod agent_loop;
pub mod error;
pub mod history;
pub mod retry;

pub use agent_loop::{default_trace_capture, AgentLoop, TraceCapture};
pub use error::{trace_capture_here, AgentError, LoopOutcome};
pub use history::{History, HistoryEntry};
pub use retry::{retry_fixed, Exhausted, RetryPolicy};
