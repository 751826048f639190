//! 桌面原语后端
//!
//! 执行器只依赖 DesktopBackend trait；鼠标/键盘注入、窗口聚焦、图像定位由具体后端实现。
//! DryRunBackend 只记录调用，用于演练与测试。

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::AgentError;

/// 鼠标按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }

    /// X11 按键编号
    pub fn x11_code(&self) -> u8 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        }
    }
}

/// 窗口查找条件（至少一项非空）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowQuery {
    pub title: Option<String>,
    pub class_name: Option<String>,
    pub process_name: Option<String>,
}

impl WindowQuery {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.class_name.is_none() && self.process_name.is_none()
    }
}

impl std::fmt::Display for WindowQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "title={:?}, class={:?}, process={:?}",
            self.title, self.class_name, self.process_name
        )
    }
}

/// 桌面原语：所有调用都是阻塞语义（await 完成即动作完成）
#[async_trait]
pub trait DesktopBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn pointer_position(&self) -> Result<(i64, i64), AgentError>;

    async fn move_to(&self, x: i64, y: i64) -> Result<(), AgentError>;

    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), AgentError>;

    /// 模板匹配：返回匹配中心点，未匹配返回 None
    async fn locate_image(
        &self,
        template: &str,
        confidence: f64,
    ) -> Result<Option<(i64, i64)>, AgentError>;

    async fn type_text(&self, text: &str) -> Result<(), AgentError>;

    /// 组合键（小写键名）
    async fn hotkey(&self, keys: &[String]) -> Result<(), AgentError>;

    /// 单键（如 enter）
    async fn press(&self, key: &str) -> Result<(), AgentError>;

    async fn focus_window(&self, query: &WindowQuery) -> Result<(), AgentError>;

    /// 连接并聚焦已存在的某类窗口
    async fn attach_window(&self, class_name: &str) -> Result<(), AgentError>;

    /// 启动程序（不等待退出）
    async fn launch(&self, program: &str) -> Result<(), AgentError>;

    /// 点击对话框按钮；对话框或按钮不存在时返回 Ok(false)
    async fn click_dialog_button(&self, dialog_title: &str, button: &str)
        -> Result<bool, AgentError>;
}

/// 演练后端：只记录调用并维护虚拟指针位置
#[derive(Debug, Default)]
pub struct DryRunBackend {
    pointer: Mutex<(i64, i64)>,
    calls: Mutex<Vec<String>>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的调用（按顺序）
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        tracing::info!(backend = "dry-run", "{}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn set_pointer(&self, x: i64, y: i64) {
        if let Ok(mut p) = self.pointer.lock() {
            *p = (x, y);
        }
    }
}

#[async_trait]
impl DesktopBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn pointer_position(&self) -> Result<(i64, i64), AgentError> {
        self.pointer
            .lock()
            .map(|p| *p)
            .map_err(|e| AgentError::Backend(e.to_string()))
    }

    async fn move_to(&self, x: i64, y: i64) -> Result<(), AgentError> {
        self.set_pointer(x, y);
        self.record(format!("move_to({x}, {y})"));
        Ok(())
    }

    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), AgentError> {
        self.set_pointer(x, y);
        self.record(format!("click({x}, {y}, {button:?})"));
        Ok(())
    }

    async fn locate_image(
        &self,
        template: &str,
        confidence: f64,
    ) -> Result<Option<(i64, i64)>, AgentError> {
        self.record(format!("locate_image({template}, {confidence})"));
        Ok(None)
    }

    async fn type_text(&self, text: &str) -> Result<(), AgentError> {
        self.record(format!("type_text({text:?})"));
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AgentError> {
        self.record(format!("hotkey({})", keys.join("+")));
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<(), AgentError> {
        self.record(format!("press({key})"));
        Ok(())
    }

    async fn focus_window(&self, query: &WindowQuery) -> Result<(), AgentError> {
        self.record(format!("focus_window({query})"));
        Ok(())
    }

    async fn attach_window(&self, class_name: &str) -> Result<(), AgentError> {
        self.record(format!("attach_window({class_name})"));
        Ok(())
    }

    async fn launch(&self, program: &str) -> Result<(), AgentError> {
        self.record(format!("launch({program})"));
        Ok(())
    }

    async fn click_dialog_button(
        &self,
        dialog_title: &str,
        button: &str,
    ) -> Result<bool, AgentError> {
        self.record(format!("click_dialog_button({dialog_title}, {button})"));
        Ok(true)
    }
}
