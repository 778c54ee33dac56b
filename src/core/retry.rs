//! 重试处理器：按错误分类的指数退避
//!
//! 对单个远端操作最多尝试 `max_retries + 1` 次（attempt 0..=max_retries）。
//! 瞬时错误在第 i 次失败后等待 `base_delay * 2^i` 再重试；不可重试错误立即原样返回；
//! 最后一次仍失败则返回带 label、总尝试次数与最后错误的 [`RetryError::Exhausted`]。
//! 退避时长只在这里计算，调用方从不自己算延迟。

use std::future::Future;
use std::time::Duration;

use crate::core::{RemoteError, RetryError};

/// 重试参数（由配置显式传入，无进程级默认值之外的隐式状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// 总尝试次数
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 第 `attempt` 次（0 起）失败后的等待时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    /// 3 次重试，2 秒基准
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }
}

/// 传输无关的重试执行器
#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    policy: RetryPolicy,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 执行 `op`，瞬时失败时退避重试
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let attempts = self.policy.attempts();
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(label, attempt = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::debug!(label, error = %err, "non-retryable failure");
                    return Err(RetryError::Permanent(err));
                }
                Err(err) if attempt >= self.policy.max_retries => {
                    tracing::warn!(label, attempts, error = %err, "retries exhausted");
                    return Err(RetryError::Exhausted {
                        label: label.to_string(),
                        attempts,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        label,
                        attempt = attempt + 1,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;
    use crate::core::NetworkErrorKind;

    /// 依次返回脚本中的结果，并记录每次调用的时刻
    fn scripted(
        script: Vec<Result<&'static str, RemoteError>>,
    ) -> (
        Arc<Mutex<Vec<Instant>>>,
        impl FnMut() -> std::future::Ready<Result<&'static str, RemoteError>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let mut script = script.into_iter();
        let last = Err(RemoteError::status(599, "script exhausted"));
        let op = move || {
            recorded.lock().unwrap().push(Instant::now());
            std::future::ready(script.next().unwrap_or_else(|| last.clone()))
        };
        (calls, op)
    }

    fn gaps(calls: &[Instant]) -> Vec<Duration> {
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_delay_doubles() {
        let p = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(400));
        assert_eq!(p.attempts(), 4);
    }

    #[test]
    fn test_attempts_saturate_at_max() {
        let p = RetryPolicy::new(u32::MAX, Duration::from_millis(1));
        assert_eq!(p.attempts(), u32::MAX);
        assert_eq!(p.delay_for(u32::MAX - 1), Duration::from_millis(u64::from(u32::MAX)));
    }

    #[test]
    fn test_default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_try_success() {
        let handler = RetryHandler::new(RetryPolicy::new(3, Duration::from_millis(100)));
        let (calls, op) = scripted(vec![Ok("success")]);
        assert_eq!(handler.execute("test operation", op).await, Ok("success"));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let base = Duration::from_millis(100);
        let handler = RetryHandler::new(RetryPolicy::new(3, base));
        let (calls, op) = scripted(vec![
            Err(RemoteError::status(429, "Too Many Requests")),
            Err(RemoteError::status(429, "Too Many Requests")),
            Ok("success"),
        ]);

        assert_eq!(handler.execute("test operation", op).await, Ok("success"));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(gaps(&calls), vec![base, base * 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_request_fails_immediately() {
        let handler = RetryHandler::new(RetryPolicy::new(3, Duration::from_millis(100)));
        let (calls, op) = scripted(vec![Err(RemoteError::status(400, "bad"))]);
        let started = Instant::now();

        let err = handler.execute("test operation", op).await.unwrap_err();

        assert_eq!(err, RetryError::Permanent(RemoteError::status(400, "bad")));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_all_attempts() {
        let base = Duration::from_millis(100);
        let handler = RetryHandler::new(RetryPolicy::new(3, base));
        let (calls, op) = scripted(vec![
            Err(RemoteError::status(503, "down")),
            Err(RemoteError::network(NetworkErrorKind::ConnectionReset, "reset")),
            Err(RemoteError::status(502, "bad gateway")),
            Err(RemoteError::status(429, "slow down")),
        ]);

        let err = handler.execute("test operation", op).await.unwrap_err();

        match &err {
            RetryError::Exhausted { label, attempts, last } => {
                assert_eq!(label, "test operation");
                assert_eq!(*attempts, 4);
                assert_eq!(last, &RemoteError::status(429, "slow down"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert!(err.to_string().contains("test operation failed after 4 attempts"));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert_eq!(gaps(&calls), vec![base, base * 2, base * 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_after_transient_is_not_wrapped() {
        let handler = RetryHandler::new(RetryPolicy::new(3, Duration::from_millis(10)));
        let (calls, op) = scripted(vec![
            Err(RemoteError::status(500, "oops")),
            Err(RemoteError::status(404, "missing")),
        ]);

        let err = handler.execute("op", op).await.unwrap_err();

        assert_eq!(err, RetryError::Permanent(RemoteError::status(404, "missing")));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let handler = RetryHandler::new(RetryPolicy::new(0, Duration::from_millis(10)));
        let (calls, op) = scripted(vec![Err(RemoteError::status(503, "down"))]);

        let err = handler.execute("op", op).await.unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
