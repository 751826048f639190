//! 桌面观察
//!
//! Observer::capture() 返回一次快照（截图 + 活动窗口标题），原样交给预言机：
//! vision 模式作为图片消息，text 模式只渲染为 `[HH:MM:SS] active window: <title>`。

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Local};
use tokio::process::Command;

use crate::core::AgentError;
use crate::llm::Message;

#[derive(Debug, Clone)]
pub struct ObservationSnapshot {
    pub image_png_base64: Option<String>,
    pub window_title: String,
    pub captured_at: DateTime<Local>,
}

impl ObservationSnapshot {
    pub fn new(window_title: impl Into<String>, image_png_base64: Option<String>) -> Self {
        Self {
            image_png_base64,
            window_title: window_title.into(),
            captured_at: Local::now(),
        }
    }

    pub fn as_text_message(&self) -> Message {
        Message::user(format!(
            "[{}] active window: {}",
            self.captured_at.format("%H:%M:%S"),
            self.window_title
        ))
    }

    /// 有截图时返回图片消息，否则退化为文本消息
    pub fn as_vision_message(&self, caption: &str) -> Message {
        match &self.image_png_base64 {
            Some(png) => Message::user_with_png(caption, png),
            None => self.as_text_message(),
        }
    }
}

#[async_trait]
pub trait Observer: Send + Sync {
    async fn capture(&self) -> Result<ObservationSnapshot, AgentError>;
}

/// 固定快照（演练 / 测试用）
#[derive(Debug, Clone, Default)]
pub struct StaticObserver {
    window_title: String,
}

impl StaticObserver {
    pub fn new(window_title: impl Into<String>) -> Self {
        Self {
            window_title: window_title.into(),
        }
    }
}

#[async_trait]
impl Observer for StaticObserver {
    async fn capture(&self) -> Result<ObservationSnapshot, AgentError> {
        Ok(ObservationSnapshot::new(self.window_title.clone(), None))
    }
}

/// X11 观察：`xdotool getactivewindow getwindowname` 取标题，`import -window root png:-` 截屏
pub struct XdotoolObserver {
    with_screenshot: bool,
}

impl XdotoolObserver {
    pub fn new(with_screenshot: bool) -> Self {
        Self { with_screenshot }
    }

    async fn active_window_title() -> Result<String, AgentError> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", "getwindowname"])
            .output()
            .await
            .map_err(|e| AgentError::Backend(format!("Failed to run xdotool: {e}")))?;
        // 没有活动窗口时 xdotool 返回非零，标题按空串处理
        if !output.status.success() {
            return Ok(String::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn screenshot_png() -> Result<Vec<u8>, AgentError> {
        let output = Command::new("import")
            .args(["-window", "root", "png:-"])
            .output()
            .await
            .map_err(|e| AgentError::Backend(format!("Failed to run import: {e}")))?;
        if !output.status.success() {
            return Err(AgentError::Backend(format!(
                "screenshot failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Observer for XdotoolObserver {
    async fn capture(&self) -> Result<ObservationSnapshot, AgentError> {
        let title = Self::active_window_title().await?;
        let image = if self.with_screenshot {
            match Self::screenshot_png().await {
                Ok(png) => Some(base64::engine::general_purpose::STANDARD.encode(png)),
                Err(e) => {
                    tracing::warn!(error = %e, "screenshot unavailable, continuing with title only");
                    None
                }
            }
        } else {
            None
        };
        tracing::debug!(window = %title, screenshot = image.is_some(), "observation captured");
        Ok(ObservationSnapshot::new(title, image))
    }
}
