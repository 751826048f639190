//! 固定间隔重试
//!
//! 执行器的点击重试、整体分派重试、保存确认重试共用；等待只发生在两次尝试之间。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// 重试策略：最多尝试次数 + 固定等待
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub wait: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

/// 重试耗尽：尝试次数与最后一次错误
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// 按固定间隔重试异步操作，成功即返回
pub async fn retry_fixed<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed"
                );
                if attempt >= policy.max_attempts {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                sleep(policy.wait).await;
            }
        }
    }
}
