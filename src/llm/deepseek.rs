//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com/v1
//! - 默认模型: deepseek-chat

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 客户端
///
/// - key 优先使用参数，其次环境变量 `DEEPSEEK_API_KEY`
/// - endpoint 未指定时使用官方地址
pub fn create_deepseek_client(
    model: Option<&str>,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> OpenAiClient {
    let api_key = api_key
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model.unwrap_or(DEEPSEEK_CHAT);
    let endpoint = endpoint.unwrap_or(DEEPSEEK_BASE_URL);
    OpenAiClient::new(Some(endpoint), model, Some(api_key.as_str()))
}
