//! 应用配置：从 config/default.toml、可选配置文件与环境变量加载
//!
//! 加载顺序：先读默认 TOML，再读 `--config` 指定的文件，最后用环境变量 `DESK__*` 覆盖
//! （双下划线表示嵌套，如 `DESK__LLM__VENDOR=deepseek`）。命令行参数在 main 中最后覆盖。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::agent_loop::{DEFAULT_HISTORY_TAIL, DEFAULT_MAX_STEPS};
use crate::executor::ExecutorSettings;
use crate::oracle::OracleMode;
use crate::recovery::RecoverySettings;

pub const ENV_PREFIX: &str = "DESK";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub executor: ExecutorSettings,
    pub recovery: RecoverySettings,
}

/// [app] 段：步数上限、回放给预言机的历史条数、观察模式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub max_steps: usize,
    pub history_tail: usize,
    pub mode: OracleMode,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            history_tail: DEFAULT_HISTORY_TAIL,
            mode: OracleMode::Vision,
        }
    }
}

/// [llm] 段：厂商、模型、端点与凭据
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / azure / deepseek / hf_local / mock
    pub vendor: String,
    /// 模型名；azure 下为 deployment
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub api_version: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            vendor: "openai".to_string(),
            model: None,
            endpoint: None,
            api_key: None,
            temperature: 0.2,
            timeout_secs: 60,
            api_version: "2024-02-15-preview".to_string(),
        }
    }
}

/// 加载配置
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在）
/// 3. 最后叠加环境变量 DESK__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.app.max_steps, 40);
        assert_eq!(config.app.history_tail, 8);
        assert_eq!(config.llm.vendor, "openai");
        assert_eq!(config.executor.retry_attempts, 3);
        assert!(config.recovery.enabled);
        assert_eq!(config.recovery.commit_message, "auto-fix by LLM");
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            r#"
[app]
max_steps = 12
mode = "text"

[llm]
vendor = "deepseek"

[executor]
click_attempts = 5

[executor.save_dialog]
dialog_title = "另存为"

[recovery]
analyzers = ["ide", "tabular=/var/log/run.csv"]
"#,
        )
        .unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.app.max_steps, 12);
        assert_eq!(config.app.mode, OracleMode::Text);
        assert_eq!(config.llm.vendor, "deepseek");
        assert_eq!(config.executor.click_attempts, 5);
        assert_eq!(config.executor.save_dialog.dialog_title, "另存为");
        assert_eq!(config.executor.save_dialog.confirm_button, "Save");
        assert_eq!(config.recovery.analyzers.len(), 2);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(PathBuf::from("/nonexistent/agent.toml"))).is_err());
    }
}
