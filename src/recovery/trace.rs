//! 从失败堆栈文本提取结构化错误
//!
//! 识别两种帧：`File "<path>", line <n>, in <function>`（取最后一个，下一行作为 code），
//! 以及 Rust backtrace 的 `N: <function>` + `at <path>:<line>:<col>`（取第一个本项目帧）。
//! message 为整段文本 trim 后的最后一行，原样保留。

use std::sync::OnceLock;

use regex::Regex;

use crate::recovery::types::StructuredError;

pub const TRACEBACK_ORIGIN: &str = "traceback";

fn python_frame() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"File "(.+?)", line (\d+), in (.*?)\n\s*(.*)"#).expect("valid frame regex")
    })
}

fn rust_frame() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*\d+:\s+(\S.*?)\s*\n\s+at\s+(.+?):(\d+):\d+\s*$")
            .expect("valid backtrace regex")
    })
}

const FOREIGN_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "tokio::", "async_trait::"];

/// 标准库、依赖与捕获函数自身的帧；`<T as Trait>::f` 按 T 判断
fn is_foreign_frame(function: &str, path: &str) -> bool {
    let owner = function.trim_start_matches('<');
    path.starts_with("/rustc/")
        || path.contains(".cargo/registry")
        || path.contains(".cargo/git")
        || FOREIGN_PREFIXES.iter().any(|p| owner.starts_with(p))
        || function.contains("trace_capture")
}

pub struct TraceAnalyzer<'a> {
    trace: &'a str,
}

impl<'a> TraceAnalyzer<'a> {
    pub fn new(trace: &'a str) -> Self {
        Self { trace }
    }

    /// 零个或一个结构化错误
    pub fn analyze(&self) -> Vec<StructuredError> {
        let Some(message) = self.trace.trim().lines().last().map(str::to_string) else {
            return Vec::new();
        };

        if let Some(caps) = python_frame().captures_iter(self.trace).last() {
            let mut err = StructuredError::new(message, TRACEBACK_ORIGIN);
            err.file = Some(caps[1].to_string());
            err.line = caps[2].parse().ok();
            err.function = Some(caps[3].trim().to_string());
            err.code = Some(caps[4].trim().to_string()).filter(|c| !c.is_empty());
            return vec![err];
        }

        let frame = rust_frame()
            .captures_iter(self.trace)
            .find(|caps| !is_foreign_frame(caps[1].trim(), caps[2].trim()));
        match frame {
            Some(caps) => {
                let mut err = StructuredError::new(message, TRACEBACK_ORIGIN);
                err.function = Some(caps[1].trim().to_string());
                err.file = Some(caps[2].trim().to_string());
                err.line = caps[3].parse().ok();
                vec![err]
            }
            None => Vec::new(),
        }
    }
}
