//! 按配置创建 LLM 客户端
//!
//! 显式传入 [llm] 段，不读写全局凭据；key 依次取配置 / 厂商环境变量。

use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmSection;
use crate::core::AgentError;
use crate::llm::{
    create_deepseek_client, HfLocalClient, LlmClient, MockLlmClient, OpenAiClient,
};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// 可用厂商
pub const VENDORS: &[&str] = &["openai", "azure", "deepseek", "hf_local", "mock"];

pub fn create_llm(section: &LlmSection) -> Result<Arc<dyn LlmClient>, AgentError> {
    let timeout = Duration::from_secs(section.timeout_secs.max(1));
    let vendor = section.vendor.trim().to_lowercase();
    tracing::info!(vendor = %vendor, model = ?section.model, "creating llm client");

    let client: Arc<dyn LlmClient> = match vendor.as_str() {
        "openai" => {
            let model = section.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            Arc::new(
                OpenAiClient::new(section.endpoint.as_deref(), model, section.api_key.as_deref())
                    .with_temperature(section.temperature)
                    .with_timeout(timeout),
            )
        }
        "deepseek" => Arc::new(
            create_deepseek_client(
                section.model.as_deref(),
                section.endpoint.as_deref(),
                section.api_key.as_deref(),
            )
            .with_temperature(section.temperature)
            .with_timeout(timeout),
        ),
        "azure" => {
            let endpoint = section
                .endpoint
                .as_deref()
                .ok_or_else(|| AgentError::Config("azure requires llm.endpoint".into()))?;
            let deployment = section
                .model
                .as_deref()
                .ok_or_else(|| AgentError::Config("azure requires llm.model (deployment)".into()))?;
            let api_key = section
                .api_key
                .clone()
                .or_else(|| std::env::var("AZURE_OPENAI_API_KEY").ok())
                .ok_or_else(|| AgentError::Config("azure requires an api key".into()))?;
            Arc::new(
                OpenAiClient::azure(endpoint, deployment, &api_key, &section.api_version)
                    .with_temperature(section.temperature)
                    .with_timeout(timeout),
            )
        }
        "hf_local" => {
            let endpoint = section
                .endpoint
                .as_deref()
                .ok_or_else(|| AgentError::Config("hf_local requires llm.endpoint".into()))?;
            Arc::new(
                HfLocalClient::new(endpoint, section.temperature, timeout)
                    .map_err(AgentError::Config)?,
            )
        }
        "mock" => Arc::new(MockLlmClient::new()),
        other => {
            return Err(AgentError::Config(format!(
                "unknown llm vendor `{other}`; expected one of {}",
                VENDORS.join(", ")
            )))
        }
    };
    Ok(client)
}
