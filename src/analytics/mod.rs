//! 分析管道
//!
//! 事件总线的消费端：把 HitEvent 聚合进按 code 分区的计数表，
//! 再由查询层拼出 dashboard 响应。

pub mod consumer;
pub mod enrich;
pub mod query;
pub mod store;

use chrono::{DateTime, Timelike, Utc};

pub use consumer::{AnalyticsConsumer, ConsumerState, DeadLetterSink, LogDeadLetterSink};
pub use query::AnalyticsQuery;
pub use store::AnalyticsStore;

/// 将时间戳截断到整点
pub(crate) fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_opt(ts.time().hour(), 0, 0)
        .unwrap()
        .and_utc()
}

/// 将时间戳截断到整分
pub(crate) fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_opt(ts.time().hour(), ts.time().minute(), 0)
        .unwrap()
        .and_utc()
}

/// 维度缺失时的占位值
pub const UNKNOWN: &str = "unknown";

/// 直接访问（无 referrer）的占位值，不进 referrer 计数
pub const DIRECT: &str = "direct";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation() {
        let ts = "2024-01-01T12:34:56Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            truncate_to_hour(ts),
            "2024-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            truncate_to_minute(ts),
            "2024-01-01T12:34:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
