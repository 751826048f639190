//! 动作执行器
//!
//! dispatch(action) 把一条强类型动作映射到桌面后端原语：
//! - 整体分派外层固定间隔重试（默认 3 次 / 1 s），耗尽后以 ActionFailed 上抛；
//! - click 自带内层重试，坐标缺失时使用当前指针位置，耗尽后返回带内 ERROR；
//! - hotkey 只放行白名单组合；
//! - 每次分派输出一条结构化审计日志（action_audit）。

pub mod backend;
pub mod custom;
pub mod focus;
pub mod save;
pub mod xdotool;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;

use crate::action::{canonical_keys, Action, ActionKind, ExecutionResult};
use crate::core::{retry_fixed, trace_capture_here, AgentError, RetryPolicy};

pub use backend::{DesktopBackend, DryRunBackend, MouseButton, WindowQuery};
pub use custom::{CustomAction, CustomActionRegistry};
pub use focus::{EditorFocus, EditorTarget};
pub use save::SaveDialog;
pub use xdotool::XdotoolBackend;

use save::secs;

/// 允许的组合键（小写，顺序敏感）
pub const ALLOWED_HOTKEYS: &[&[&str]] = &[&["ctrl", "s"], &["ctrl", "o"], &["alt", "f4"]];

/// 白名单的可读形式，用于错误信息
pub fn allowed_hotkeys_display() -> String {
    ALLOWED_HOTKEYS
        .iter()
        .map(|combo| combo.join("+"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_allowed_hotkey(keys: &[String]) -> bool {
    ALLOWED_HOTKEYS
        .iter()
        .any(|combo| combo.len() == keys.len() && combo.iter().zip(keys).all(|(a, b)| *a == b))
}

/// 执行器配置（对应配置文件 [executor] 段）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub retry_attempts: usize,
    pub retry_wait_secs: f64,
    pub click_attempts: usize,
    pub click_wait_secs: f64,
    pub image_confidence: f64,
    pub editor_class: String,
    pub editor_process: String,
    pub editor_program: String,
    pub settle_secs: f64,
    pub save_dialog: SaveDialog,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_wait_secs: 1.0,
            click_attempts: 3,
            click_wait_secs: 1.0,
            image_confidence: 0.9,
            editor_class: "Notepad".to_string(),
            editor_process: "notepad".to_string(),
            editor_program: "notepad".to_string(),
            settle_secs: 2.0,
            save_dialog: SaveDialog::default(),
        }
    }
}

impl ExecutorSettings {
    pub fn dispatch_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_attempts, secs(self.retry_wait_secs))
    }

    pub fn click_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.click_attempts, secs(self.click_wait_secs))
    }

    pub fn editor_target(&self) -> EditorTarget {
        EditorTarget {
            class_name: self.editor_class.clone(),
            process_hint: self.editor_process.clone(),
            program: self.editor_program.clone(),
            settle: secs(self.settle_secs),
        }
    }
}

pub struct ActionExecutor {
    backend: Arc<dyn DesktopBackend>,
    settings: ExecutorSettings,
    custom: CustomActionRegistry,
    /// 最近一次失败处的堆栈，dispatch 包装 ActionFailed 时取走
    failure_trace: Mutex<Option<String>>,
}

impl ActionExecutor {
    pub fn new(backend: Arc<dyn DesktopBackend>, settings: ExecutorSettings) -> Self {
        Self {
            backend,
            settings,
            custom: CustomActionRegistry::with_builtins(),
            failure_trace: Mutex::new(None),
        }
    }

    pub fn with_custom_actions(mut self, custom: CustomActionRegistry) -> Self {
        self.custom = custom;
        self
    }

    pub fn register_custom(&mut self, action: impl CustomAction + 'static) {
        self.custom.register(action);
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 带外层重试的分派；重试耗尽返回 ActionFailed（source 为最后一次错误）
    pub async fn dispatch(&self, action: &Action) -> Result<ExecutionResult, AgentError> {
        let start = Instant::now();
        let policy = self.settings.dispatch_policy();
        let result = retry_fixed(&policy, action.kind.as_str(), || self.execute_once(action)).await;

        let outcome = match &result {
            Ok(ExecutionResult::Ok) => "ok",
            Ok(ExecutionResult::Finish) => "finish",
            Ok(ExecutionResult::Error(_)) => "in_band_error",
            Err(_) => "failed",
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": action.kind.as_str(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(action),
            "backend": self.backend.name(),
        });
        tracing::info!(audit = %audit, "action");

        let trace = self.failure_trace.lock().ok().and_then(|mut slot| slot.take());
        result.map_err(|exhausted| AgentError::ActionFailed {
            action: action.kind.to_string(),
            attempts: exhausted.attempts,
            source: Box::new(exhausted.last_error),
            trace,
        })
    }

    /// 记录出错位置的堆栈后原样返回错误
    fn trace_capture(&self, err: AgentError) -> AgentError {
        if let Ok(mut slot) = self.failure_trace.lock() {
            *slot = Some(trace_capture_here());
        }
        err
    }

    /// 单次执行（不含外层重试）；逃逸的错误在产生处记录堆栈
    pub async fn execute_once(&self, action: &Action) -> Result<ExecutionResult, AgentError> {
        tracing::debug!(%action, "executing");
        match &action.kind {
            ActionKind::Move => {
                let x = action.require_i64(&["x"]).map_err(|e| self.trace_capture(e))?;
                let y = action.require_i64(&["y"]).map_err(|e| self.trace_capture(e))?;
                self.backend
                    .move_to(x, y)
                    .await
                    .map_err(|e| self.trace_capture(e))?;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::Click => self.click(action).await,
            ActionKind::ClickImage => {
                let template = action
                    .require_str(&["img", "image", "template"])
                    .map_err(|e| self.trace_capture(e))?;
                let confidence = action
                    .arg_f64(&["conf", "confidence"])
                    .unwrap_or(self.settings.image_confidence);
                let (x, y) = self
                    .backend
                    .locate_image(template, confidence)
                    .await
                    .map_err(|e| self.trace_capture(e))?
                    .ok_or_else(|| {
                        self.trace_capture(AgentError::ImageNotFound(template.to_string()))
                    })?;
                self.backend
                    .click(x, y, MouseButton::Left)
                    .await
                    .map_err(|e| self.trace_capture(e))?;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::TypeText => {
                let text = action
                    .require_str(&["text"])
                    .map_err(|e| self.trace_capture(e))?;
                self.backend
                    .type_text(text)
                    .await
                    .map_err(|e| self.trace_capture(e))?;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::Hotkey => {
                let keys = canonical_keys(&action.args).ok_or_else(|| {
                    self.trace_capture(AgentError::MissingArgument {
                        action: "hotkey".into(),
                        arg: "keys".into(),
                    })
                })?;
                if !is_allowed_hotkey(&keys) {
                    return Err(self.trace_capture(AgentError::ForbiddenHotkey {
                        keys: keys.join("+"),
                        allowed: allowed_hotkeys_display(),
                    }));
                }
                self.backend
                    .hotkey(&keys)
                    .await
                    .map_err(|e| self.trace_capture(e))?;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::FocusWindow => {
                let query = WindowQuery {
                    title: action.arg_str(&["title"]).map(str::to_string),
                    class_name: action.arg_str(&["class_name", "class"]).map(str::to_string),
                    process_name: action
                        .arg_str(&["process_name", "process"])
                        .map(str::to_string),
                };
                if query.is_empty() {
                    return Err(self.trace_capture(AgentError::MissingArgument {
                        action: "focus_window".into(),
                        arg: "title".into(),
                    }));
                }
                let target = self.settings.editor_target();
                if target.matches(&query) {
                    focus::ensure_editor_focus(self.backend.as_ref(), &target)
                        .await
                        .map_err(|e| self.trace_capture(e))?;
                } else {
                    self.backend
                        .focus_window(&query)
                        .await
                        .map_err(|e| self.trace_capture(e))?;
                }
                Ok(ExecutionResult::Ok)
            }
            ActionKind::Sleep => {
                let seconds = action
                    .arg_f64(&["seconds", "sec", "duration"])
                    .unwrap_or(1.0);
                tokio::time::sleep(secs(seconds)).await;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::SaveFile => {
                let path = action
                    .require_str(&["path"])
                    .map_err(|e| self.trace_capture(e))?;
                save::save_file(self.backend.as_ref(), &self.settings.save_dialog, path)
                    .await
                    .map_err(|e| self.trace_capture(e))?;
                Ok(ExecutionResult::Ok)
            }
            ActionKind::Finish => Ok(ExecutionResult::Finish),
            ActionKind::Custom(name) => {
                let handler = self
                    .custom
                    .get(name)
                    .ok_or_else(|| {
                        self.trace_capture(AgentError::UnknownAction(name.clone()))
                    })?;
                handler
                    .execute(&action.args, self.backend.as_ref())
                    .await
                    .map_err(|e| self.trace_capture(e))
            }
        }
    }

    /// 点击：缺坐标时取当前指针；内层重试耗尽返回带内 ERROR
    async fn click(&self, action: &Action) -> Result<ExecutionResult, AgentError> {
        let button = MouseButton::parse(action.arg_str(&["button"]).unwrap_or("left"));
        let x = action.arg_i64(&["x"]);
        let y = action.arg_i64(&["y"]);

        let policy = self.settings.click_policy();
        let clicked = retry_fixed(&policy, "click", || async move {
            let (x, y) = match (x, y) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    let pos = self.backend.pointer_position().await?;
                    tracing::info!(x = pos.0, y = pos.1, "click without coordinates, using pointer");
                    pos
                }
            };
            self.backend.click(x, y, button).await
        })
        .await;

        match clicked {
            Ok(()) => Ok(ExecutionResult::Ok),
            Err(exhausted) => Ok(ExecutionResult::Error(format!(
                "click failed after {} attempts: {}",
                exhausted.attempts, exhausted.last_error
            ))),
        }
    }
}

fn args_preview(action: &Action) -> String {
    let s = serde_json::Value::Object(action.args.clone()).to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
