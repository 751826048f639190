//! AgentLoop 端到端测试：脚本化预言机 + dry-run 后端 + 假版本控制

mod common;

use std::sync::Arc;

use serde_json::json;

use desk_agent::action::ExecutionResult;
use desk_agent::core::{AgentError, AgentLoop, LoopOutcome, TraceCapture};
use desk_agent::observer::StaticObserver;
use desk_agent::recovery::{LogAnalyzer, PatchSynthesizer, StructuredError, TabularLogAnalyzer};

use common::*;

fn build_loop(
    oracle: Arc<ScriptedOracle>,
    vcs: Arc<FakeVcs>,
    working_dir: &std::path::Path,
) -> (Arc<desk_agent::executor::DryRunBackend>, AgentLoop) {
    let (backend, executor) = dry_executor();
    let synthesizer = PatchSynthesizer::new(oracle.clone(), vcs, &recovery_settings(working_dir));
    let agent = AgentLoop::new(
        "save the note",
        oracle,
        Arc::new(StaticObserver::new("Untitled - Notepad")),
        executor,
        synthesizer,
    );
    (backend, agent)
}

fn no_frames() -> TraceCapture {
    Box::new(|err: &AgentError| err.chain_message())
}

#[tokio::test]
async fn test_click_then_finish_takes_two_steps() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(ScriptedOracle::with_plan(vec![
        json!({"action": "click", "args": {"x": 10, "y": 10}}),
        json!({"action": "finish"}),
    ]));
    let (backend, mut agent) = build_loop(oracle.clone(), Arc::new(FakeVcs::default()), dir.path());

    let outcome = agent.run().await.unwrap();

    assert_eq!(outcome, LoopOutcome::Finished { steps: 2 });
    let entries = agent.history().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].result, ExecutionResult::Ok);
    assert_eq!(entries[1].result, ExecutionResult::Finish);
    assert_eq!(backend.calls(), vec!["click(10, 10, Left)"]);
    assert_eq!(oracle.next_calls(), 0);
}

#[tokio::test]
async fn test_empty_plan_asks_single_next_action_without_new_plan() {
    let dir = tempfile::tempdir().unwrap();
    let sleep = json!({"action": "sleep", "args": {"seconds": 0}});
    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![sleep.clone()])
            .then_next(sleep.clone())
            .then_next(sleep),
    );
    let (_, mut agent) = build_loop(oracle.clone(), Arc::new(FakeVcs::default()), dir.path());

    let outcome = agent.run().await.unwrap();

    // 每次计划清空只问一次下一步；第三次回答 finish
    assert_eq!(outcome, LoopOutcome::Finished { steps: 3 });
    assert_eq!(oracle.plan_calls(), 1);
    assert_eq!(oracle.next_calls(), 3);
    assert_eq!(agent.history().len(), 3);
}

#[tokio::test]
async fn test_invalid_commands_do_not_consume_steps() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(ScriptedOracle::with_plan(vec![
        json!({"args": {"x": 1}}),
        json!({"action": "hotkey", "args": {}}),
        json!("click"),
    ]));
    let (backend, mut agent) = build_loop(oracle.clone(), Arc::new(FakeVcs::default()), dir.path());

    let outcome = agent.run().await.unwrap();

    assert_eq!(outcome, LoopOutcome::PlanExhausted { steps: 0 });
    assert!(agent.history().is_empty());
    assert!(backend.calls().is_empty());
    assert_eq!(oracle.next_calls(), 0);
}

#[tokio::test]
async fn test_in_band_error_asks_for_next_action() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![
            json!({"action": "flaky_sensor"}),
            json!({"action": "type_text", "args": {"text": "later"}}),
        ])
        .then_next(json!({"action": "hotkey", "args": {"key": "Ctrl+S"}})),
    );
    let (backend, mut agent) = build_loop(oracle.clone(), Arc::new(FakeVcs::default()), dir.path());

    let outcome = agent.run().await.unwrap();

    // 带内 ERROR → 单步插队 hotkey → 继续原计划 → 计划空 → finish
    assert_eq!(outcome, LoopOutcome::Finished { steps: 3 });
    assert_eq!(oracle.next_calls(), 2);
    assert_eq!(backend.calls(), vec!["hotkey(ctrl+s)", "type_text(\"later\")"]);
    assert!(agent.history().entries()[0].result.is_error());
}

#[tokio::test]
async fn test_step_limit() {
    let dir = tempfile::tempdir().unwrap();
    let sleep = json!({"action": "sleep", "args": {"seconds": 0}});
    let oracle = Arc::new(ScriptedOracle::with_plan(vec![sleep.clone(), sleep.clone(), sleep]));
    let (_, agent) = build_loop(oracle, Arc::new(FakeVcs::default()), dir.path());
    let mut agent = agent.with_max_steps(2);

    let outcome = agent.run().await.unwrap();
    assert_eq!(outcome, LoopOutcome::StepLimitReached { steps: 2 });
}

#[tokio::test]
async fn test_no_actionable_error_aborts_without_restart() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(ScriptedOracle::with_plan(vec![
        json!({"action": "hotkey", "args": {"key": "Ctrl+Shift+Esc"}}),
    ]));
    let vcs = Arc::new(FakeVcs::default());
    let (_, agent) = build_loop(oracle.clone(), vcs.clone(), dir.path());
    let failing_analyzer: Box<dyn LogAnalyzer> = Box::new(TabularLogAnalyzer::new(None));
    let mut agent = agent
        .with_trace_capture(no_frames())
        .with_analyzers(vec![failing_analyzer]);

    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, AgentError::NoActionableError));
    assert!(vcs.calls().is_empty());
    assert_eq!(oracle.text_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_successful_patch_requests_restart() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("app")).unwrap();
    std::fs::write(dir.path().join("app/agent.py"), "def run():\n    dispatch(cmd)\n").unwrap();

    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![json!({"action": "click_image", "args": {"img": "ok.png"}})])
            .then_text(&format!("```diff\n{AGENT_PY_DIFF}```")),
    );
    let vcs = Arc::new(FakeVcs::default());
    let (_, agent) = build_loop(oracle.clone(), vcs.clone(), dir.path());
    let mut agent = agent.with_trace_capture(Box::new(single_frame_trace));

    let outcome = agent.run().await.unwrap();

    assert_eq!(outcome, LoopOutcome::RestartRequested);
    assert_eq!(
        vcs.calls(),
        vec![
            "apply(--- a/app/agent.py)",
            "stage(app/agent.py)",
            "commit(auto-fix by LLM)",
        ]
    );
    let backup = std::fs::read_to_string(dir.path().join("app/agent.py.orig")).unwrap();
    assert!(backup.contains("dispatch(cmd)"));
}

#[tokio::test]
async fn test_failed_patch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![json!({"action": "click_image", "args": {"img": "ok.png"}})])
            .then_text(AGENT_PY_DIFF),
    );
    let vcs = Arc::new(FakeVcs::failing());
    let (_, agent) = build_loop(oracle, vcs.clone(), dir.path());
    let mut agent = agent.with_trace_capture(Box::new(single_frame_trace));

    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, AgentError::PatchApplyFailed(_)));
    assert_eq!(vcs.calls().len(), 1);
}

#[tokio::test]
async fn test_recovery_uses_log_analyzers() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("run.csv");
    std::fs::write(&csv, "Step,Error\n1,\n2,save dialog never appeared\n").unwrap();

    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![json!({"action": "click_image", "args": {"img": "ok.png"}})])
            .then_text("I am not sure how to fix this."),
    );
    let vcs = Arc::new(FakeVcs::default());
    let (_, agent) = build_loop(oracle.clone(), vcs.clone(), dir.path());
    let analyzer: Box<dyn LogAnalyzer> = Box::new(TabularLogAnalyzer::new(Some(csv)));
    let mut agent = agent
        .with_trace_capture(no_frames())
        .with_analyzers(vec![analyzer]);

    let err = agent.run().await.unwrap_err();

    // 一条表格错误 → 一次补丁请求；回复不是 diff，没有任何尝试
    assert!(matches!(err, AgentError::PatchApplyFailed(_)));
    assert_eq!(oracle.text_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_recovery_disabled_returns_executor_error() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(ScriptedOracle::with_plan(vec![json!({"action": "teleport"})]));
    let (_, agent) = build_loop(oracle, Arc::new(FakeVcs::default()), dir.path());
    let mut agent = agent.without_recovery();

    let err = agent.run().await.unwrap_err();
    match err {
        AgentError::ActionFailed {
            action,
            attempts,
            source,
            ..
        } => {
            assert_eq!(action, "teleport");
            assert_eq!(attempts, 3);
            assert!(matches!(*source, AgentError::UnknownAction(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_default_trace_points_at_failing_operation() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Arc::new(
        ScriptedOracle::with_plan(vec![json!({"action": "click_image", "args": {"img": "ok.png"}})])
            .then_text("no diff available"),
    );
    let (_, mut agent) = build_loop(oracle.clone(), Arc::new(FakeVcs::default()), dir.path());

    let err = agent.run().await.unwrap_err();
    assert!(matches!(err, AgentError::PatchApplyFailed(_)));

    let prompts = oracle.prompts();
    assert_eq!(prompts.len(), 1);
    let json = &prompts[0][prompts[0].find('{').unwrap()..];
    let error: StructuredError = serde_json::from_str(json.trim()).unwrap();
    let file = error.file.unwrap();
    assert!(file.ends_with("executor/mod.rs"), "unexpected frame file {file}");
    assert!(!file.contains("agent_loop"));
    assert!(error.function.unwrap().contains("execute_once"));
    assert!(error.message.contains("ok.png"));
}
