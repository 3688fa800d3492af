//! 数据库瞬时错误重试
//!
//! 只有连接层面的故障（池耗尽、断线）值得重试，其余错误立即上抛。
//! 退避采用 full jitter：在指数封顶值以内随机取等待时间，重试风暴
//! 下比固定抖动打散得更开。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 重试预算：次数与退避区间
#[derive(Clone, Copy)]
pub struct RetryBudget {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryBudget {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            attempts: config.retry_count,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// 第 attempt 次失败后的等待时间
    ///
    /// 封顶值 = min(base × 2^attempt, max)，实际等待在 [0, 封顶值]
    /// 内均匀随机。
    fn delay_after(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let cap_ms = exp.min(self.max_delay).max(self.base_delay).as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=cap_ms))
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// 瞬时错误判定
pub fn is_transient(err: &DbErr) -> bool {
    matches!(err, DbErr::ConnectionAcquire(_) | DbErr::Conn(_))
}

/// 执行 op；瞬时错误在预算内重试，预算耗尽或不可重试错误直接返回
pub async fn retry_transient<T, F, Fut>(
    name: &str,
    budget: RetryBudget,
    mut op: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    for attempt in 0..=budget.attempts {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", name, attempt);
                }
                return Ok(value);
            }
            Err(e) if is_transient(&e) && attempt < budget.attempts => {
                let delay = budget.delay_after(attempt);
                warn!(
                    "'{}' transient failure ({}/{}): {}, retrying in {:?}",
                    name,
                    attempt + 1,
                    budget.attempts,
                    e,
                    delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "connection refused".to_string()
        ))));
        assert!(!is_transient(&DbErr::Custom("constraint".to_string())));
        assert!(!is_transient(&DbErr::RecordNotInserted));
    }

    #[test]
    fn test_delay_bounded_by_cap() {
        let budget = RetryBudget {
            attempts: 8,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        for attempt in 0..8 {
            assert!(budget.delay_after(attempt) <= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> =
            retry_transient("op", RetryBudget::default(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DbErr::Custom("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_retried_until_success() {
        let calls = AtomicU32::new(0);
        let budget = RetryBudget {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result = retry_transient("op", budget, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbErr::Conn(sea_orm::RuntimeErr::Internal(
                    "flaky".to_string(),
                )))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
