//! Agent 主控循环
//!
//! 观察 → （首轮）取计划 → 弹出命令 → 规范化 → 校验 → 分派 → 记录历史 → 重新观察 → 按需单步重规划。
//! 只有在计划为空或带内 ERROR 时才向预言机要下一步；执行器重试耗尽的错误进入自愈子循环：
//! 堆栈 + 外部日志提取结构化错误 → 补丁合成与应用 → 全部成功时请求宿主重启。

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::Instrument;

use crate::action::{command_kind, normalize, validate, Action, ExecutionResult, RawCommand};
use crate::core::{trace_capture_here, AgentError, History, LoopOutcome};
use crate::executor::ActionExecutor;
use crate::observer::Observer;
use crate::oracle::PlanningOracle;
use crate::recovery::{LogAnalyzer, PatchSynthesizer, TraceAnalyzer};

pub const DEFAULT_MAX_STEPS: usize = 40;
pub const DEFAULT_HISTORY_TAIL: usize = 8;

/// 把逃逸出执行器的错误渲染为堆栈文本（最后一行是错误信息）
pub type TraceCapture = Box<dyn Fn(&AgentError) -> String + Send + Sync>;

/// 优先使用执行器在出错处记录的堆栈；没有时才在当前位置捕获
pub fn default_trace_capture() -> TraceCapture {
    Box::new(|err: &AgentError| {
        let backtrace = match err {
            AgentError::ActionFailed {
                trace: Some(trace), ..
            } => trace.clone(),
            _ => trace_capture_here(),
        };
        format!("{backtrace}\n{}", err.chain_message())
    })
}

fn is_finish_command(cmd: &RawCommand) -> bool {
    command_kind(cmd)
        .map(|k| k.trim().eq_ignore_ascii_case("finish"))
        .unwrap_or(false)
}

pub struct AgentLoop {
    goal: String,
    run_id: String,
    oracle: Arc<dyn PlanningOracle>,
    observer: Arc<dyn Observer>,
    executor: ActionExecutor,
    analyzers: Vec<Box<dyn LogAnalyzer>>,
    synthesizer: Option<PatchSynthesizer>,
    trace_capture: TraceCapture,
    max_steps: usize,
    history_tail: usize,
    plan: VecDeque<RawCommand>,
    history: History,
}

impl AgentLoop {
    pub fn new(
        goal: impl Into<String>,
        oracle: Arc<dyn PlanningOracle>,
        observer: Arc<dyn Observer>,
        executor: ActionExecutor,
        synthesizer: PatchSynthesizer,
    ) -> Self {
        Self {
            goal: goal.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            oracle,
            observer,
            executor,
            analyzers: Vec::new(),
            synthesizer: Some(synthesizer),
            trace_capture: default_trace_capture(),
            max_steps: DEFAULT_MAX_STEPS,
            history_tail: DEFAULT_HISTORY_TAIL,
            plan: VecDeque::new(),
            history: History::new(),
        }
    }

    pub fn with_analyzers(mut self, analyzers: Vec<Box<dyn LogAnalyzer>>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_history_tail(mut self, history_tail: usize) -> Self {
        self.history_tail = history_tail;
        self
    }

    /// 关闭自愈：执行器错误直接中止
    pub fn without_recovery(mut self) -> Self {
        self.synthesizer = None;
        self
    }

    pub fn with_trace_capture(mut self, capture: TraceCapture) -> Self {
        self.trace_capture = capture;
        self
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub async fn run(&mut self) -> Result<LoopOutcome, AgentError> {
        let span = tracing::info_span!("agent_run", run_id = %self.run_id, goal = %self.goal);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<LoopOutcome, AgentError> {
        tracing::info!(
            max_steps = self.max_steps,
            backend = self.executor.backend_name(),
            "run started"
        );
        let mut observation = self.observer.capture().await?;
        let mut planned = false;
        let mut step = 0usize;

        loop {
            if step >= self.max_steps {
                tracing::warn!(steps = step, "step limit reached");
                return Ok(LoopOutcome::StepLimitReached { steps: step });
            }

            if !planned {
                planned = true;
                if self.plan.is_empty() {
                    let plan = self.oracle.get_plan(&self.goal, &observation).await?;
                    self.plan.extend(plan);
                }
            }

            let Some(raw) = self.plan.pop_front() else {
                tracing::info!(steps = step, "plan exhausted");
                return Ok(LoopOutcome::PlanExhausted { steps: step });
            };

            let cmd = normalize(raw);
            if !validate(&cmd) {
                tracing::warn!(command = %cmd, "invalid command skipped");
                continue;
            }
            let action = match Action::from_command(&cmd) {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid command skipped");
                    continue;
                }
            };

            let result = match self.executor.dispatch(&action).await {
                Ok(result) => result,
                Err(err) => return self.recover(err).await,
            };

            step += 1;
            tracing::info!(step, action = %action, result = %result, "step done");
            self.history.record(step, action, result.clone())?;

            if result == ExecutionResult::Finish {
                tracing::info!(steps = step, "task finished");
                return Ok(LoopOutcome::Finished { steps: step });
            }

            observation = self.observer.capture().await?;
            if self.plan.is_empty() || result.is_error() {
                let next = self
                    .oracle
                    .next_action(
                        &self.goal,
                        &result,
                        &observation,
                        self.history.tail(self.history_tail),
                    )
                    .await?;
                let next = normalize(next);
                if is_finish_command(&next) {
                    tracing::info!(steps = step, "oracle reports goal achieved");
                    return Ok(LoopOutcome::Finished { steps: step });
                }
                self.plan.push_front(next);
            }
        }
    }

    /// 自愈子循环
    async fn recover(&mut self, err: AgentError) -> Result<LoopOutcome, AgentError> {
        tracing::error!(error = %err.chain_message(), "action failed after retries");
        let Some(synthesizer) = self.synthesizer.as_ref() else {
            tracing::error!("recovery disabled, aborting run");
            return Err(err);
        };

        let trace = (self.trace_capture)(&err);
        let mut errors = TraceAnalyzer::new(&trace).analyze();
        tracing::info!(found = errors.len(), "trace analyzed");

        for analyzer in &self.analyzers {
            match analyzer.analyze() {
                Ok(found) => {
                    tracing::info!(analyzer = analyzer.source_name(), found = found.len(), "log analyzed");
                    errors.extend(found);
                }
                Err(e) => {
                    tracing::warn!(analyzer = analyzer.source_name(), error = %e, "log analyzer failed, skipped")
                }
            }
        }

        if errors.is_empty() {
            tracing::error!("no structured error extracted, aborting run");
            return Err(AgentError::NoActionableError);
        }

        let suggestions = synthesizer.generate_suggestions(&errors).await?;
        if synthesizer.apply_optimizations(&suggestions).await {
            tracing::info!(patches = suggestions.len(), "patches applied, restart requested");
            self.plan.clear();
            return Ok(LoopOutcome::RestartRequested);
        }

        tracing::error!("patch application incomplete, aborting run");
        Err(AgentError::PatchApplyFailed(format!(
            "{} suggestion(s) for {} error(s) were not all applied",
            suggestions.len(),
            errors.len()
        )))
    }
}
