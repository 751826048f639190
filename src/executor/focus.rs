//! 编辑器窗口聚焦状态机
//!
//! NotAttempted → 连接已有窗口 → Attached；
//! 连接失败 → 启动新进程 → 等待 settle → 再连接一次 → Attached | Failed（FocusFailed）。

use std::time::Duration;

use crate::core::AgentError;
use crate::executor::backend::{DesktopBackend, WindowQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorFocus {
    NotAttempted,
    Launched,
    Attached,
    Failed(String),
}

/// 需要特殊处理的编辑器（按窗口类名或进程名识别）
#[derive(Debug, Clone)]
pub struct EditorTarget {
    pub class_name: String,
    pub process_hint: String,
    pub program: String,
    pub settle: Duration,
}

impl EditorTarget {
    /// 类名精确匹配，或进程名包含提示串（忽略大小写）
    pub fn matches(&self, query: &WindowQuery) -> bool {
        if query.class_name.as_deref() == Some(self.class_name.as_str()) {
            return true;
        }
        let hint = self.process_hint.to_lowercase();
        !hint.is_empty()
            && query
                .process_name
                .as_deref()
                .map(|p| p.to_lowercase().contains(&hint))
                .unwrap_or(false)
    }
}

/// 驱动状态机直到终态；Failed 以 FocusFailed 返回
pub async fn ensure_editor_focus(
    backend: &dyn DesktopBackend,
    target: &EditorTarget,
) -> Result<EditorFocus, AgentError> {
    let mut state = EditorFocus::NotAttempted;
    loop {
        tracing::debug!(?state, editor = %target.class_name, "editor focus");
        state = match state {
            EditorFocus::NotAttempted => match backend.attach_window(&target.class_name).await {
                Ok(()) => EditorFocus::Attached,
                Err(e) => {
                    tracing::info!(error = %e, program = %target.program, "no running editor, launching");
                    match backend.launch(&target.program).await {
                        Ok(()) => {
                            tokio::time::sleep(target.settle).await;
                            EditorFocus::Launched
                        }
                        Err(e) => EditorFocus::Failed(e.to_string()),
                    }
                }
            },
            EditorFocus::Launched => match backend.attach_window(&target.class_name).await {
                Ok(()) => EditorFocus::Attached,
                Err(e) => EditorFocus::Failed(e.to_string()),
            },
            EditorFocus::Attached => return Ok(EditorFocus::Attached),
            EditorFocus::Failed(reason) => return Err(AgentError::FocusFailed(reason)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::executor::backend::testing::FaultyBackend;
    use crate::executor::backend::DryRunBackend;

    fn notepad() -> EditorTarget {
        EditorTarget {
            class_name: "Notepad".into(),
            process_hint: "notepad".into(),
            program: "notepad".into(),
            settle: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_matches_class_or_process() {
        let target = notepad();
        assert!(target.matches(&WindowQuery {
            class_name: Some("Notepad".into()),
            ..Default::default()
        }));
        assert!(target.matches(&WindowQuery {
            process_name: Some("NOTEPAD.EXE".into()),
            ..Default::default()
        }));
        assert!(!target.matches(&WindowQuery {
            title: Some("Notepad".into()),
            ..Default::default()
        }));
    }

    #[tokio::test]
    async fn test_attaches_to_running_editor() {
        let backend = DryRunBackend::new();
        let state = ensure_editor_focus(&backend, &notepad()).await.unwrap();
        assert_eq!(state, EditorFocus::Attached);
        assert_eq!(backend.calls(), vec!["attach_window(Notepad)".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_then_attaches_after_settle() {
        let backend = FaultyBackend {
            attach_failures: AtomicUsize::new(1),
            ..Default::default()
        };
        let start = tokio::time::Instant::now();
        let state = ensure_editor_focus(&backend, &notepad()).await.unwrap();
        assert_eq!(state, EditorFocus::Attached);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(
            backend.calls(),
            vec!["attach_window(Notepad)", "launch(notepad)", "attach_window(Notepad)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_error_fails_without_settle() {
        let backend = FaultyBackend {
            attach_failures: AtomicUsize::new(1),
            launch_fails: true,
            ..Default::default()
        };
        let start = tokio::time::Instant::now();
        let err = ensure_editor_focus(&backend, &notepad()).await.unwrap_err();
        assert!(matches!(err, AgentError::FocusFailed(ref reason) if reason.contains("not installed")));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(backend.calls(), vec!["attach_window(Notepad)", "launch(notepad)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attach_error_fails_once() {
        let backend = FaultyBackend {
            attach_failures: AtomicUsize::new(5),
            ..Default::default()
        };
        let start = tokio::time::Instant::now();
        let err = ensure_editor_focus(&backend, &notepad()).await.unwrap_err();
        assert!(matches!(err, AgentError::FocusFailed(_)));
        // 只等一次 settle，只重连一次
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(
            backend.calls(),
            vec!["attach_window(Notepad)", "launch(notepad)", "attach_window(Notepad)"]
        );
    }
}
