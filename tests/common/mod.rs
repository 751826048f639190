//! 集成测试共用的脚本化预言机、假版本控制与构造函数

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use desk_agent::action::{ExecutionResult, RawCommand};
use desk_agent::core::{AgentError, HistoryEntry};
use desk_agent::executor::{
    ActionExecutor, CustomAction, DesktopBackend, DryRunBackend, ExecutorSettings,
};
use desk_agent::observer::ObservationSnapshot;
use desk_agent::oracle::PlanningOracle;
use desk_agent::recovery::{RecoverySettings, VersionControl};

/// 预置计划、下一步与自由文本回复的预言机；next_action 用完后返回 finish
#[derive(Default)]
pub struct ScriptedOracle {
    plan: Mutex<Vec<RawCommand>>,
    next: Mutex<VecDeque<RawCommand>>,
    texts: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    pub plan_calls: AtomicUsize,
    pub next_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn with_plan(plan: Vec<RawCommand>) -> Self {
        Self {
            plan: Mutex::new(plan),
            ..Default::default()
        }
    }

    pub fn then_next(self, cmd: RawCommand) -> Self {
        self.next.lock().unwrap().push_back(cmd);
        self
    }

    pub fn then_text(self, text: &str) -> Self {
        self.texts.lock().unwrap().push_back(text.to_string());
        self
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub fn next_calls(&self) -> usize {
        self.next_calls.load(Ordering::SeqCst)
    }

    /// generate_text 收到的全部提示词
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanningOracle for ScriptedOracle {
    async fn get_plan(
        &self,
        _goal: &str,
        _observation: &ObservationSnapshot,
    ) -> Result<Vec<RawCommand>, AgentError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(std::mem::take(&mut *self.plan.lock().unwrap()))
    }

    async fn next_action(
        &self,
        _goal: &str,
        _last_result: &ExecutionResult,
        _observation: &ObservationSnapshot,
        _history_tail: &[HistoryEntry],
    ) -> Result<RawCommand, AgentError> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .next
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| serde_json::json!({"action": "finish"})))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AgentError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.texts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Llm("no scripted text".into()))
    }
}

/// 记录调用的版本控制；可设置在 apply 时失败
#[derive(Default)]
pub struct FakeVcs {
    pub calls: Mutex<Vec<String>>,
    pub fail_apply: bool,
}

impl FakeVcs {
    pub fn failing() -> Self {
        Self {
            fail_apply: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn apply(&self, diff_path: &Path) -> Result<(), AgentError> {
        let diff = std::fs::read_to_string(diff_path)?;
        self.calls
            .lock()
            .unwrap()
            .push(format!("apply({})", diff.lines().next().unwrap_or_default()));
        if self.fail_apply {
            return Err(AgentError::PatchApplyFailed("patch does not apply".into()));
        }
        Ok(())
    }

    async fn stage(&self, file: &Path) -> Result<(), AgentError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("stage({})", file.display()));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<(), AgentError> {
        self.calls.lock().unwrap().push(format!("commit({message})"));
        Ok(())
    }
}

/// 总是返回带内 ERROR 的自定义动作
pub struct InBandFailure;

#[async_trait]
impl CustomAction for InBandFailure {
    fn name(&self) -> &str {
        "flaky_sensor"
    }

    async fn execute(
        &self,
        _args: &Map<String, Value>,
        _backend: &dyn DesktopBackend,
    ) -> Result<ExecutionResult, AgentError> {
        Ok(ExecutionResult::Error("sensor not ready".into()))
    }
}

/// 等待为零的执行器配置，避免测试真实 sleep
pub fn fast_settings() -> ExecutorSettings {
    ExecutorSettings {
        retry_wait_secs: 0.0,
        click_wait_secs: 0.0,
        ..Default::default()
    }
}

pub fn dry_executor() -> (Arc<DryRunBackend>, ActionExecutor) {
    let backend = Arc::new(DryRunBackend::new());
    let mut executor = ActionExecutor::new(backend.clone(), fast_settings());
    executor.register_custom(InBandFailure);
    (backend, executor)
}

pub fn recovery_settings(working_dir: &Path) -> RecoverySettings {
    RecoverySettings {
        working_dir: Some(PathBuf::from(working_dir)),
        ..Default::default()
    }
}

/// 单帧 Python 风格堆栈，指向 working_dir 下的 app/agent.py
pub fn single_frame_trace(err: &AgentError) -> String {
    format!(
        "Traceback (most recent call last):\n  File \"app/agent.py\", line 3, in run\n    dispatch(cmd)\n{}",
        err.chain_message()
    )
}

pub const AGENT_PY_DIFF: &str = "--- a/app/agent.py\n+++ b/app/agent.py\n@@ -1,3 +1,3 @@\n def run():\n-    dispatch(cmd)\n+    dispatch(normalize(cmd))\n";
