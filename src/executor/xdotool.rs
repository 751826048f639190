//! X11 后端：通过 xdotool 注入鼠标/键盘与窗口操作
//!
//! 每个原语对应一次 xdotool 调用；不提供模板匹配，locate_image 总是返回 None。

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::AgentError;
use crate::executor::backend::{DesktopBackend, MouseButton, WindowQuery};

/// xdotool 键名映射（其余键原样传入）
fn x11_key_name(key: &str) -> String {
    match key {
        "ctrl" | "control" => "ctrl".to_string(),
        "alt" | "option" => "alt".to_string(),
        "cmd" | "command" | "win" | "super" => "super".to_string(),
        "enter" | "return" => "Return".to_string(),
        "esc" | "escape" => "Escape".to_string(),
        "tab" => "Tab".to_string(),
        k if k.len() > 1 && k.starts_with('f') && k[1..].chars().all(|c| c.is_ascii_digit()) => {
            k.to_uppercase()
        }
        k => k.to_string(),
    }
}

pub struct XdotoolBackend {
    binary: String,
    type_delay_ms: u64,
}

impl Default for XdotoolBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl XdotoolBackend {
    pub fn new() -> Self {
        Self {
            binary: "xdotool".to_string(),
            type_delay_ms: 50,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, AgentError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| AgentError::Backend(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Backend(format!(
                "{} {} failed: {}",
                self.binary,
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// 按条件查找第一个可见窗口 id
    async fn search_window(&self, query: &WindowQuery) -> Result<String, AgentError> {
        let (flag, pattern) = if let Some(class) = &query.class_name {
            ("--class", class.as_str())
        } else if let Some(title) = &query.title {
            ("--name", title.as_str())
        } else if let Some(process) = &query.process_name {
            ("--classname", process.as_str())
        } else {
            return Err(AgentError::WindowNotFound("empty window query".into()));
        };

        let out = self
            .run(&["search", "--onlyvisible", flag, pattern])
            .await
            .map_err(|_| AgentError::WindowNotFound(query.to_string()))?;
        out.lines()
            .next()
            .map(str::to_string)
            .ok_or_else(|| AgentError::WindowNotFound(query.to_string()))
    }
}

#[async_trait]
impl DesktopBackend for XdotoolBackend {
    fn name(&self) -> &str {
        "xdotool"
    }

    async fn pointer_position(&self) -> Result<(i64, i64), AgentError> {
        let out = self.run(&["getmouselocation", "--shell"]).await?;
        let mut x = None;
        let mut y = None;
        for line in out.lines() {
            if let Some(v) = line.strip_prefix("X=") {
                x = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix("Y=") {
                y = v.trim().parse().ok();
            }
        }
        match (x, y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(AgentError::Backend(format!("unexpected getmouselocation output: {out}"))),
        }
    }

    async fn move_to(&self, x: i64, y: i64) -> Result<(), AgentError> {
        self.run(&["mousemove", &x.to_string(), &y.to_string()]).await?;
        Ok(())
    }

    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), AgentError> {
        self.run(&[
            "mousemove",
            &x.to_string(),
            &y.to_string(),
            "click",
            &button.x11_code().to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn locate_image(
        &self,
        template: &str,
        _confidence: f64,
    ) -> Result<Option<(i64, i64)>, AgentError> {
        tracing::debug!(template, "xdotool backend has no template matching");
        Ok(None)
    }

    async fn type_text(&self, text: &str) -> Result<(), AgentError> {
        let delay = self.type_delay_ms.to_string();
        self.run(&["type", "--delay", &delay, "--", text]).await?;
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AgentError> {
        let combo = keys
            .iter()
            .map(|k| x11_key_name(k))
            .collect::<Vec<_>>()
            .join("+");
        self.run(&["key", &combo]).await?;
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<(), AgentError> {
        self.run(&["key", &x11_key_name(&key.to_lowercase())]).await?;
        Ok(())
    }

    async fn focus_window(&self, query: &WindowQuery) -> Result<(), AgentError> {
        let id = self.search_window(query).await?;
        self.run(&["windowactivate", "--sync", &id]).await?;
        Ok(())
    }

    async fn attach_window(&self, class_name: &str) -> Result<(), AgentError> {
        let query = WindowQuery {
            class_name: Some(class_name.to_string()),
            ..Default::default()
        };
        self.focus_window(&query).await
    }

    async fn launch(&self, program: &str) -> Result<(), AgentError> {
        Command::new(program)
            .spawn()
            .map_err(|e| AgentError::Backend(format!("Failed to launch {program}: {e}")))?;
        Ok(())
    }

    async fn click_dialog_button(
        &self,
        dialog_title: &str,
        button: &str,
    ) -> Result<bool, AgentError> {
        // X11 没有通用的控件树，只能聚焦对话框后用键盘确认
        let query = WindowQuery {
            title: Some(dialog_title.to_string()),
            ..Default::default()
        };
        match self.focus_window(&query).await {
            Ok(()) => {
                tracing::debug!(dialog_title, button, "dialog focused, confirming with Return");
                self.run(&["key", "Return"]).await?;
                Ok(true)
            }
            Err(AgentError::WindowNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
