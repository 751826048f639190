//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），对 Config 泛型，
//! 同一实现服务 OpenAI / DeepSeek / Azure。带截图的用户消息转为 text + image_url 两段内容。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、模型名与采样温度
pub struct OpenAiClient<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
    temperature: f32,
    timeout: Duration,
    pub usage: TokenUsage,
}

impl OpenAiClient<OpenAIConfig> {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };
        Self::with_config(config, model)
    }
}

impl OpenAiClient<AzureConfig> {
    /// Azure OpenAI：deployment 即模型名
    pub fn azure(endpoint: &str, deployment: &str, api_key: &str, api_version: &str) -> Self {
        let config = AzureConfig::new()
            .with_api_base(endpoint.trim_end_matches('/'))
            .with_deployment_id(deployment)
            .with_api_key(api_key)
            .with_api_version(api_version);
        Self::with_config(config, deployment)
    }
}

impl<C: Config> OpenAiClient<C> {
    pub fn with_config(config: C, model: &str) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        messages.iter().map(to_openai_message).collect()
    }
}

fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, String> {
    let msg = match m.role {
        Role::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| e.to_string())?,
        ),
        Role::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| e.to_string())?,
        ),
        Role::User => {
            let mut builder = ChatCompletionRequestUserMessageArgs::default();
            match &m.image_url {
                Some(url) => {
                    let text = ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?;
                    let image = ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(
                            ImageUrlArgs::default()
                                .url(url.clone())
                                .build()
                                .map_err(|e| e.to_string())?,
                        )
                        .build()
                        .map_err(|e| e.to_string())?;
                    let parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                        vec![text.into(), image.into()];
                    builder.content(parts);
                }
                None => {
                    builder.content(m.content.clone());
                }
            }
            ChatCompletionRequestMessage::User(builder.build().map_err(|e| e.to_string())?)
        }
    };
    Ok(msg)
}

#[async_trait]
impl<C: Config + Send + Sync> LlmClient for OpenAiClient<C> {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(self.to_openai_messages(messages)?)
            .build()
            .map_err(|e| e.to_string())?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| format!("request timed out after {}s", self.timeout.as_secs()))?
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_message_converts_to_parts() {
        let msg = Message::user_with_png("(screenshot)", "AAAA");
        let converted = to_openai_message(&msg).unwrap();
        let json = serde_json::to_value(&converted).unwrap();
        let content = json["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_plain_user_message() {
        let converted = to_openai_message(&Message::user("hi")).unwrap();
        let json = serde_json::to_value(&converted).unwrap();
        assert_eq!(json["content"], "hi");
        assert_eq!(json["role"], "user");
    }
}
