//! Mock LLM 客户端（用于测试与演练，无需 API）
//!
//! 按顺序返回预置回复；脚本用完后一律返回 `[{"action": "finish"}]`。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

pub const MOCK_FINISH: &str = r#"[{"action": "finish"}]"#;

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    calls: Mutex<usize>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let reply = self
            .script
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| MOCK_FINISH.to_string());
        tracing::debug!(messages = messages.len(), reply = %reply, "mock llm reply");
        Ok(reply)
    }
}
