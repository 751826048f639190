//! 规划预言机
//!
//! PlanningOracle 给出完整计划或单步动作，同时作为补丁生成的自由文本生成器。
//! LlmOracle 负责拼装消息（system + 目标 + 观察 + 历史尾部）并解析回复。

pub mod parse;
pub mod prompts;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::action::{ExecutionResult, RawCommand};
use crate::core::{AgentError, HistoryEntry};
use crate::llm::{LlmClient, Message};
use crate::observer::ObservationSnapshot;

pub use parse::{parse_next_action, parse_plan, strip_code_fence};

#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// 一次性返回完整计划；无法解析时 MalformedPlan
    async fn get_plan(
        &self,
        goal: &str,
        observation: &ObservationSnapshot,
    ) -> Result<Vec<RawCommand>, AgentError>;

    /// 返回下一条动作；空或无法解析的回复视为 finish
    async fn next_action(
        &self,
        goal: &str,
        last_result: &ExecutionResult,
        observation: &ObservationSnapshot,
        history_tail: &[HistoryEntry],
    ) -> Result<RawCommand, AgentError>;

    /// 自由文本生成（补丁合成用）
    async fn generate_text(&self, prompt: &str) -> Result<String, AgentError>;
}

/// 观察呈现方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    #[default]
    Vision,
    Text,
}

impl FromStr for OracleMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vision" => Ok(OracleMode::Vision),
            "text" => Ok(OracleMode::Text),
            other => Err(AgentError::Config(format!(
                "unknown mode `{other}`; expected vision or text"
            ))),
        }
    }
}

impl fmt::Display for OracleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleMode::Vision => f.write_str("vision"),
            OracleMode::Text => f.write_str("text"),
        }
    }
}

pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
    mode: OracleMode,
    system_prompt: String,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>, mode: OracleMode) -> Self {
        Self {
            llm,
            mode,
            system_prompt: prompts::system_prompt(mode),
        }
    }

    pub fn mode(&self) -> OracleMode {
        self.mode
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    fn observation_message(&self, observation: &ObservationSnapshot) -> Message {
        match self.mode {
            OracleMode::Vision => observation.as_vision_message("(current screenshot)"),
            OracleMode::Text => observation.as_text_message(),
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, AgentError> {
        self.llm.complete(messages).await.map_err(AgentError::Llm)
    }
}

#[async_trait]
impl PlanningOracle for LlmOracle {
    async fn get_plan(
        &self,
        goal: &str,
        observation: &ObservationSnapshot,
    ) -> Result<Vec<RawCommand>, AgentError> {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(prompts::plan_request(goal)),
            self.observation_message(observation),
        ];
        let reply = self.complete(&messages).await?;
        let plan = parse_plan(&reply)?;
        tracing::info!(steps = plan.len(), "plan received");
        Ok(plan)
    }

    async fn next_action(
        &self,
        goal: &str,
        last_result: &ExecutionResult,
        observation: &ObservationSnapshot,
        history_tail: &[HistoryEntry],
    ) -> Result<RawCommand, AgentError> {
        let mut messages = vec![Message::system(self.system_prompt.clone())];
        if !history_tail.is_empty() {
            let tail = history_tail
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(Message::assistant(tail));
        }
        messages.push(Message::user(prompts::next_action_request(
            goal,
            &last_result.to_string(),
        )));
        messages.push(self.observation_message(observation));

        let reply = self.complete(&messages).await?;
        let cmd = parse_next_action(&reply);
        tracing::info!(next = %cmd, "next action received");
        Ok(cmd)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AgentError> {
        self.complete(&[Message::user(prompt)]).await
    }
}
