use std::time::Duration;

use crate::error::AppError;

/// 瞬时错误的重试策略：固定次数上限，延迟按次数线性增长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后（从 1 开始）的等待时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step * attempt
    }

    /// 第 `attempt` 次失败后是否还应重试
    pub fn should_retry(&self, attempt: u32, err: &AppError) -> bool {
        attempt < self.max_attempts && err.is_transient()
    }
}

/// 按重试策略重复执行一个只读或幂等的页面操作
///
/// `$op` 每次重试都会重新求值，因此可以直接写 `portal.list_rows()`。
macro_rules! with_retry {
    ($policy:expr, $what:expr, $op:expr) => {{
        let policy: &$crate::workflow::RetryPolicy = &$policy;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match $op.await {
                Ok(value) => break Ok(value),
                Err(err) if policy.should_retry(attempt, &err) => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "{} 失败 (尝试 {}/{}): {}，{:?} 后重试",
                        $what,
                        attempt,
                        policy.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => break Err(err),
            }
        }
    }};
}

pub(crate) use with_retry;
