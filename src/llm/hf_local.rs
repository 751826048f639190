//! 本地 HuggingFace TGI 客户端
//!
//! 把非 system 消息按行拼成 prompt，POST `{endpoint}/generate`，取 `generated_text`。
//! TGI 不接收图片，截图被忽略。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::{LlmClient, Message, Role};

const MAX_NEW_TOKENS: u32 = 512;

pub struct HfLocalClient {
    http: reqwest::Client,
    endpoint: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

impl HfLocalClient {
    pub fn new(endpoint: &str, temperature: f32, timeout: Duration) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            temperature,
        })
    }

    fn build_prompt(messages: &[Message]) -> String {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmClient for HfLocalClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let body = serde_json::json!({
            "inputs": Self::build_prompt(messages),
            "parameters": {
                "temperature": self.temperature,
                "max_new_tokens": MAX_NEW_TOKENS,
            }
        });
        let resp = self
            .http
            .post(format!("{}/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let parsed: GenerateResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.generated_text)
    }
}
