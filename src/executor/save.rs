//! 保存文件的多阶段流程（尽力而为）
//!
//! 1. ctrl+s 唤起保存对话框并等待；2. 输入目标路径并等待；
//! 3. 点击对话框确认按钮（有限次重试），仍失败则按 enter；
//! 4. 若出现覆盖确认对话框则确认；5. 指针微移作为可见反馈。

use std::time::Duration;

use serde::Deserialize;

use crate::core::{retry_fixed, AgentError, RetryPolicy};
use crate::executor::backend::DesktopBackend;

/// 保存对话框参数（标题与按钮文字随系统语言不同，可配置）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveDialog {
    pub dialog_title: String,
    pub confirm_button: String,
    pub overwrite_title: String,
    pub overwrite_button: String,
    pub shortcut_wait_secs: f64,
    pub path_wait_secs: f64,
    pub confirm_attempts: usize,
    pub confirm_wait_secs: f64,
}

impl Default for SaveDialog {
    fn default() -> Self {
        Self {
            dialog_title: "Save As".to_string(),
            confirm_button: "Save".to_string(),
            overwrite_title: "Confirm Save As".to_string(),
            overwrite_button: "Yes".to_string(),
            shortcut_wait_secs: 2.0,
            path_wait_secs: 1.0,
            confirm_attempts: 3,
            confirm_wait_secs: 1.0,
        }
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

pub async fn save_file(
    backend: &dyn DesktopBackend,
    dialog: &SaveDialog,
    path: &str,
) -> Result<(), AgentError> {
    backend
        .hotkey(&["ctrl".to_string(), "s".to_string()])
        .await?;
    tokio::time::sleep(secs(dialog.shortcut_wait_secs)).await;

    backend.type_text(path).await?;
    tokio::time::sleep(secs(dialog.path_wait_secs)).await;

    let policy = RetryPolicy::fixed(dialog.confirm_attempts, secs(dialog.confirm_wait_secs));
    let confirmed = retry_fixed(&policy, "save_confirm", || async {
        match backend
            .click_dialog_button(&dialog.dialog_title, &dialog.confirm_button)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(AgentError::WindowNotFound(dialog.dialog_title.clone())),
            Err(e) => Err(e),
        }
    })
    .await;
    if let Err(exhausted) = confirmed {
        tracing::info!(
            attempts = exhausted.attempts,
            error = %exhausted.last_error,
            "save dialog button unavailable, falling back to enter"
        );
        backend.press("enter").await?;
    }
    tokio::time::sleep(secs(dialog.confirm_wait_secs)).await;

    match backend
        .click_dialog_button(&dialog.overwrite_title, &dialog.overwrite_button)
        .await
    {
        Ok(true) => tracing::info!(path, "overwrite confirmed"),
        Ok(false) => {}
        Err(e) => tracing::debug!(error = %e, "overwrite dialog check failed"),
    }

    match backend.pointer_position().await {
        Ok((x, y)) => {
            if let Err(e) = backend.move_to(x + 10, y + 10).await {
                tracing::debug!(error = %e, "pointer nudge failed");
            }
        }
        Err(e) => tracing::debug!(error = %e, "pointer position unavailable, nudge skipped"),
    }
    Ok(())
}
