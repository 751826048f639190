//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Azure / DeepSeek / HF TGI / Mock）

pub mod deepseek;
pub mod hf_local;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use hf_local::HfLocalClient;
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use provider::create_llm;
pub use traits::LlmClient;
