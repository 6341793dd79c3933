use crate::domain::model::Source;
use crate::domain::pagination::PaginationConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 計算同一來源連續兩個請求之間的等待時間。
///
/// 每個來源各自獨立，不跨來源協調。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn for_source(source: &Source, config: &PaginationConfig) -> Self {
        let delay = match source.rate_limit_per_minute {
            Some(budget) if budget > 0 => Duration::from_millis(60_000 / budget as u64),
            _ => Duration::from_millis(config.delay_ms),
        };
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 第 N 頁與第 N+1 頁之間等待；被取消時回傳 false
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        if self.delay.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}
