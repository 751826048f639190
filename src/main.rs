//! desk-agent：自愈式桌面自动化智能体
//!
//! 入口：解析命令行、加载配置、组装预言机 / 观察器 / 执行器 / 自愈组件并运行主循环；
//! 主循环请求重启时以相同参数替换当前进程。

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use desk_agent::config::{load_config, AppConfig};
use desk_agent::core::{AgentLoop, LoopOutcome};
use desk_agent::executor::{ActionExecutor, DesktopBackend, DryRunBackend, XdotoolBackend};
use desk_agent::llm::create_llm;
use desk_agent::observer::{Observer, StaticObserver, XdotoolObserver};
use desk_agent::oracle::{LlmOracle, OracleMode, PlanningOracle};
use desk_agent::recovery::{build_analyzers, AnalyzerSpec, GitCli, PatchSynthesizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// X11 桌面（xdotool）
    Xdotool,
    /// 只记录动作，不操作桌面
    DryRun,
}

#[derive(Debug, Parser)]
#[command(name = "desk-agent", version, about = "Self-healing desktop automation agent")]
struct Cli {
    /// 自然语言任务目标
    goal: String,

    /// vision（截图）或 text（仅窗口标题）
    #[arg(long)]
    mode: Option<OracleMode>,

    /// openai | azure | deepseek | hf_local | mock
    #[arg(long)]
    vendor: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    /// 额外的 TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_steps: Option<usize>,

    #[arg(long, value_enum, default_value_t = BackendKind::Xdotool)]
    backend: BackendKind,

    /// 外部日志分析器：key 或 key=path（可重复；指定后替换配置中的列表）
    #[arg(long = "analyzer")]
    analyzers: Vec<AnalyzerSpec>,

    /// 关闭自愈子循环
    #[arg(long)]
    no_recovery: bool,
}

/// 命令行参数覆盖配置
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(mode) = cli.mode {
        config.app.mode = mode;
    }
    if let Some(max_steps) = cli.max_steps {
        config.app.max_steps = max_steps;
    }
    if let Some(vendor) = &cli.vendor {
        config.llm.vendor = vendor.clone();
    }
    if cli.model.is_some() {
        config.llm.model = cli.model.clone();
    }
    if cli.endpoint.is_some() {
        config.llm.endpoint = cli.endpoint.clone();
    }
    if cli.api_key.is_some() {
        config.llm.api_key = cli.api_key.clone();
    }
    if !cli.analyzers.is_empty() {
        config.recovery.analyzers = cli.analyzers.clone();
    }
    if cli.no_recovery {
        config.recovery.enabled = false;
    }
}

async fn run(cli: &Cli) -> anyhow::Result<LoopOutcome> {
    let mut config = load_config(cli.config.clone()).context("Failed to load config")?;
    apply_overrides(&mut config, cli);

    let llm = create_llm(&config.llm).context("Failed to create LLM client")?;
    let llm_oracle = Arc::new(LlmOracle::new(llm, config.app.mode));
    let oracle: Arc<dyn PlanningOracle> = llm_oracle.clone();
    tracing::info!(vendor = %config.llm.vendor, mode = %llm_oracle.mode(), "oracle ready");

    let (backend, observer): (Arc<dyn DesktopBackend>, Arc<dyn Observer>) = match cli.backend {
        BackendKind::Xdotool => (
            Arc::new(XdotoolBackend::new()),
            Arc::new(XdotoolObserver::new(config.app.mode == OracleMode::Vision)),
        ),
        BackendKind::DryRun => (
            Arc::new(DryRunBackend::new()),
            Arc::new(StaticObserver::new("dry-run desktop")),
        ),
    };
    let executor = ActionExecutor::new(backend, config.executor.clone());

    let vcs = Arc::new(GitCli::new(config.recovery.working_dir()));
    let synthesizer = PatchSynthesizer::new(oracle.clone(), vcs, &config.recovery);

    let mut agent = AgentLoop::new(cli.goal.clone(), oracle, observer, executor, synthesizer)
        .with_analyzers(build_analyzers(&config.recovery.analyzers))
        .with_max_steps(config.app.max_steps)
        .with_history_tail(config.app.history_tail);
    if !config.recovery.enabled {
        agent = agent.without_recovery();
    }

    let result = agent.run().await;
    let (prompt_tokens, completion_tokens, total_tokens) = llm_oracle.token_usage();
    tracing::info!(
        run_id = agent.run_id(),
        prompt_tokens,
        completion_tokens,
        total_tokens,
        "token usage"
    );
    let outcome = result.context("Agent run aborted")?;
    Ok(outcome)
}

/// 以相同参数重新启动当前可执行文件
fn restart() -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    tracing::info!(exe = %exe.display(), "restarting with identical arguments");
    relaunch(&exe, &args)
}

#[cfg(unix)]
fn relaunch(exe: &Path, args: &[OsString]) -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;

    // exec 成功时不会返回
    let err = std::process::Command::new(exe).args(args).exec();
    Err(err).context("Failed to exec")
}

#[cfg(not(unix))]
fn relaunch(exe: &Path, args: &[OsString]) -> anyhow::Result<()> {
    let status = std::process::Command::new(exe)
        .args(args)
        .status()
        .context("Failed to relaunch")?;
    std::process::exit(status.code().unwrap_or(1));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    desk_agent::observability::init();
    let cli = Cli::parse();

    match run(&cli).await? {
        LoopOutcome::Finished { steps } => tracing::info!(steps, "goal reached"),
        LoopOutcome::PlanExhausted { steps } => {
            tracing::warn!(steps, "plan exhausted before the goal was confirmed")
        }
        LoopOutcome::StepLimitReached { steps } => {
            tracing::warn!(steps, "stopped at the step limit")
        }
        LoopOutcome::RestartRequested => restart()?,
    }
    Ok(())
}
