//! desk-agent：自愈式桌面自动化智能体
//!
//! 模块划分：
//! - **action**: 动作数据模型、命令规范化与校验
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、固定间隔重试、执行历史、主控循环
//! - **executor**: 动作执行器与桌面后端（xdotool / dry-run）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Azure / DeepSeek / HF TGI / Mock）
//! - **observer**: 屏幕与活动窗口观察
//! - **oracle**: 规划预言机（提示词、回复解析）
//! - **recovery**: 错误提取、日志分析器、补丁合成与 git 应用

pub mod action;
pub mod config;
pub mod core;
pub mod executor;
pub mod llm;
pub mod observability;
pub mod observer;
pub mod oracle;
pub mod recovery;

pub use crate::core::{AgentError, AgentLoop, LoopOutcome};
