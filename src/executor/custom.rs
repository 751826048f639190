//! 自定义动作：内置种类之外的动作名在此注册表中解析

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::action::ExecutionResult;
use crate::core::AgentError;
use crate::executor::backend::DesktopBackend;

#[async_trait]
pub trait CustomAction: Send + Sync {
    /// 动作名（命令中的 `action` 字段）
    fn name(&self) -> &str;

    async fn execute(
        &self,
        args: &Map<String, Value>,
        backend: &dyn DesktopBackend,
    ) -> Result<ExecutionResult, AgentError>;
}

#[derive(Default, Clone)]
pub struct CustomActionRegistry {
    actions: HashMap<String, Arc<dyn CustomAction>>,
}

impl CustomActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置 click_ctrl
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ClickControl);
        registry
    }

    pub fn register(&mut self, action: impl CustomAction + 'static) {
        self.actions
            .insert(action.name().to_string(), Arc::new(action));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomAction>> {
        self.actions.get(name).cloned()
    }
}

/// 点击指定窗口内的命名控件：`{"title": "...", "ctrl": "..."}`
pub struct ClickControl;

#[async_trait]
impl CustomAction for ClickControl {
    fn name(&self) -> &str {
        "click_ctrl"
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        backend: &dyn DesktopBackend,
    ) -> Result<ExecutionResult, AgentError> {
        let missing = |arg: &str| AgentError::MissingArgument {
            action: "click_ctrl".into(),
            arg: arg.into(),
        };
        let title = args
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("title"))?;
        let ctrl = args
            .get("ctrl")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("ctrl"))?;

        if backend.click_dialog_button(title, ctrl).await? {
            Ok(ExecutionResult::Ok)
        } else {
            Err(AgentError::WindowNotFound(format!("{title} / {ctrl}")))
        }
    }
}
