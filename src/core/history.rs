//! 执行历史：只追加、按步号严格递增；回放给预言机时只取尾部若干条

use std::fmt;

use crate::action::{Action, ExecutionResult};
use crate::core::AgentError;

/// 单条历史：第几步、执行了什么、结果如何
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub step: usize,
    pub action: Action,
    pub result: ExecutionResult,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.step, self.action, self.result)
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条；步号不大于上一条时返回 HistoryOrder
    pub fn record(
        &mut self,
        step: usize,
        action: Action,
        result: ExecutionResult,
    ) -> Result<(), AgentError> {
        if let Some(last) = self.entries.last() {
            if step <= last.step {
                return Err(AgentError::HistoryOrder {
                    step,
                    last: last.step,
                });
            }
        }
        self.entries.push(HistoryEntry {
            step,
            action,
            result,
        });
        Ok(())
    }

    /// 最近 n 条（按时间顺序）
    pub fn tail(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn test_rejects_non_increasing_step() {
        let mut history = History::new();
        history
            .record(1, Action::new(ActionKind::Sleep), ExecutionResult::Ok)
            .unwrap();
        let err = history
            .record(1, Action::new(ActionKind::Finish), ExecutionResult::Finish)
            .unwrap_err();
        assert!(matches!(err, AgentError::HistoryOrder { step: 1, last: 1 }));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_tail_keeps_latest() {
        let mut history = History::new();
        for step in 1..=10 {
            history
                .record(step, Action::new(ActionKind::Sleep), ExecutionResult::Ok)
                .unwrap();
        }
        let tail = history.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].step, 8);
        assert_eq!(history.tail(50).len(), 10);
    }

    #[test]
    fn test_entry_display() {
        let entry = HistoryEntry {
            step: 2,
            action: Action::new(ActionKind::Click).with_arg("x", 10),
            result: ExecutionResult::Error("boom".into()),
        };
        assert_eq!(
            entry.to_string(),
            r#"2:{"action":"click","args":{"x":10}}->ERROR: boom"#
        );
    }
}
