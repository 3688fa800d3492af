//! Analytics query layer
//!
//! 把计数表的行重建成 dashboard 响应：时间序列（按需补零）、
//! top 来源/地理/设备占比、访问时间、区间总量。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::errors::{HoplinkError, Result};

use super::AnalyticsStore;
use super::{truncate_to_hour, truncate_to_minute};

/// 时间序列粒度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    #[default]
    Hour,
    Day,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            _ => None,
        }
    }

    fn step(self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        }
    }

    fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Minute => truncate_to_minute(ts),
            Self::Hour => truncate_to_hour(ts),
            Self::Day => ts.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc(),
        }
    }
}

/// 补零序列的最大桶数；超过则退化为稀疏序列
const MAX_MATERIALIZED_BUCKETS: usize = 10_000;

/// 默认 top-N
pub const DEFAULT_TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub bucket: DateTime<Utc>,
    pub hits: i64,
}

/// 带占比的分类统计
#[derive(Debug, Clone, Serialize)]
pub struct RankedStat {
    pub name: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTimes {
    pub first_accessed: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// 单链接 dashboard 数据
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub code: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub granularity: String,
    pub time_series: Vec<TimeSeriesPoint>,
    pub top_referrers: Vec<RankedStat>,
    pub geographic: Vec<RankedStat>,
    pub devices: Vec<RankedStat>,
    pub browsers: Vec<RankedStat>,
    pub access_times: AccessTimes,
    pub total_hits: i64,
    pub unique_visitors: u64,
}

/// 精简视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub code: String,
    pub total_hits: i64,
    pub unique_visitors: u64,
    pub top_referrer: Option<String>,
    pub top_country: Option<String>,
    pub first_accessed: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
}

pub struct AnalyticsQuery {
    store: Arc<AnalyticsStore>,
}

impl AnalyticsQuery {
    pub fn new(store: Arc<AnalyticsStore>) -> Self {
        Self { store }
    }

    /// 解析日期范围，支持 RFC3339 和 YYYY-MM-DD；缺省取最近 30 天
    ///
    /// 日期格式的 end 取当天末尾，保证区间含当天。
    pub fn parse_date_range(
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let parse = |s: &str, end_of_day: bool| -> Result<DateTime<Utc>> {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let time = if end_of_day {
                    date.and_hms_opt(23, 59, 59).unwrap()
                } else {
                    date.and_hms_opt(0, 0, 0).unwrap()
                };
                return Ok(time.and_utc());
            }
            Err(HoplinkError::invalid_query(format!(
                "Invalid date '{}'. Supported formats: RFC3339 or YYYY-MM-DD",
                s
            )))
        };

        let (start, end) = match (start_date, end_date) {
            (Some(s), Some(e)) => (parse(s, false)?, parse(e, true)?),
            (Some(s), None) => (parse(s, false)?, Utc::now()),
            (None, Some(e)) => {
                let end = parse(e, true)?;
                (end - Duration::days(30), end)
            }
            (None, None) => {
                let end = Utc::now();
                (end - Duration::days(30), end)
            }
        };

        if start > end {
            return Err(HoplinkError::invalid_query(
                "Start date must not be later than end date",
            ));
        }

        Ok((start, end))
    }

    /// dashboard 主查询
    pub async fn get_analytics(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        top_limit: usize,
    ) -> Result<AnalyticsReport> {
        let time_series = self.time_series(code, start, end, granularity).await?;

        let top_referrers = ranked(self.store.referrers(code).await?, top_limit);
        let geographic = ranked(self.store.geographic(code).await?, top_limit);

        // devices 表按 (device, browser, os) 存，两个维度独立聚合
        let device_rows = self.store.devices(code).await?;
        let mut by_device: HashMap<String, i64> = HashMap::new();
        let mut by_browser: HashMap<String, i64> = HashMap::new();
        for (device, browser, _os, count) in &device_rows {
            *by_device.entry(device.clone()).or_insert(0) += count;
            *by_browser.entry(browser.clone()).or_insert(0) += count;
        }

        let devices = ranked(sorted_desc(by_device), top_limit);
        let browsers = ranked(sorted_desc(by_browser), top_limit);

        let access = self.store.access_times(code).await?;

        // 区间总量从小时表累加
        let total_hits: i64 = self
            .store
            .hits_by_hour(code, truncate_to_hour(start), end)
            .await?
            .iter()
            .map(|(_, c)| c)
            .sum();

        let unique_visitors = self
            .store
            .unique_visitor_count(code, start.date_naive(), end.date_naive())
            .await?;

        debug!(
            "Analytics report for '{}': {} series points, {} hits",
            code,
            time_series.len(),
            total_hits
        );

        Ok(AnalyticsReport {
            code: code.to_string(),
            start_date: start,
            end_date: end,
            granularity: match granularity {
                Granularity::Minute => "minute",
                Granularity::Hour => "hour",
                Granularity::Day => "day",
            }
            .to_string(),
            time_series,
            top_referrers,
            geographic,
            devices,
            browsers,
            access_times: AccessTimes {
                first_accessed: access.map(|(f, _)| f),
                last_accessed: access.map(|(_, l)| l),
            },
            total_hits,
            unique_visitors,
        })
    }

    /// 精简视图
    pub async fn get_summary(&self, code: &str) -> Result<AnalyticsSummary> {
        let end = Utc::now();
        let start = end - Duration::days(30);

        let total_hits: i64 = self
            .store
            .hits_by_hour(code, truncate_to_hour(start), end)
            .await?
            .iter()
            .map(|(_, c)| c)
            .sum();

        let unique_visitors = self
            .store
            .unique_visitor_count(code, start.date_naive(), end.date_naive())
            .await?;

        let top_referrer = self
            .store
            .referrers(code)
            .await?
            .into_iter()
            .next()
            .map(|(name, _)| name);

        let top_country = self
            .store
            .geographic(code)
            .await?
            .into_iter()
            .next()
            .map(|(name, _)| name);

        let access = self.store.access_times(code).await?;

        Ok(AnalyticsSummary {
            code: code.to_string(),
            total_hits,
            unique_visitors,
            top_referrer,
            top_country,
            first_accessed: access.map(|(f, _)| f),
            last_accessed: access.map(|(_, l)| l),
        })
    }

    /// 时间序列（导出共用），升序，按需补零
    pub async fn time_series(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let rows = match granularity {
            Granularity::Minute => {
                self.store
                    .hits_by_minute(code, truncate_to_minute(start), end)
                    .await?
            }
            Granularity::Hour => {
                self.store
                    .hits_by_hour(code, truncate_to_hour(start), end)
                    .await?
            }
            // 天粒度：小时行折叠到天桶
            Granularity::Day => {
                let hourly = self
                    .store
                    .hits_by_hour(code, truncate_to_hour(start), end)
                    .await?;
                let mut days: Vec<(DateTime<Utc>, i64)> = Vec::new();
                for (bucket, count) in hourly {
                    let day = Granularity::Day.truncate(bucket);
                    match days.last_mut() {
                        Some((last_day, total)) if *last_day == day => *total += count,
                        _ => days.push((day, count)),
                    }
                }
                days
            }
        };

        Ok(zero_fill(rows, start, end, granularity))
    }
}

/// 计数列表 → 带占比的 top-N
fn ranked(rows: Vec<(String, i64)>, top_limit: usize) -> Vec<RankedStat> {
    let total: i64 = rows.iter().map(|(_, c)| c).sum();
    rows.into_iter()
        .take(top_limit)
        .map(|(name, count)| RankedStat {
            name,
            count,
            percentage: if total > 0 {
                (count as f64 * 10000.0 / total as f64).round() / 100.0
            } else {
                0.0
            },
        })
        .collect()
}

fn sorted_desc(map: HashMap<String, i64>) -> Vec<(String, i64)> {
    let mut rows: Vec<_> = map.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// 区间内补零；桶数超过上限时退化为稀疏序列
fn zero_fill(
    rows: Vec<(DateTime<Utc>, i64)>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Vec<TimeSeriesPoint> {
    let step = granularity.step();
    let first_bucket = granularity.truncate(start);
    let bucket_count = ((end - first_bucket).num_seconds() / step.num_seconds()).max(0) as usize + 1;

    if bucket_count > MAX_MATERIALIZED_BUCKETS {
        return rows
            .into_iter()
            .map(|(bucket, hits)| TimeSeriesPoint { bucket, hits })
            .collect();
    }

    let by_bucket: HashMap<DateTime<Utc>, i64> = rows.into_iter().collect();
    let mut series = Vec::with_capacity(bucket_count);
    let mut bucket = first_bucket;
    while bucket <= end {
        series.push(TimeSeriesPoint {
            bucket,
            hits: by_bucket.get(&bucket).copied().unwrap_or(0),
        });
        bucket += step;
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_range() {
        let (start, end) =
            AnalyticsQuery::parse_date_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59+00:00");

        // RFC3339 原样接受
        let (start, _) = AnalyticsQuery::parse_date_range(
            Some("2024-01-01T12:00:00Z"),
            Some("2024-01-02T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T12:00:00+00:00");

        // 倒置区间报错
        assert!(
            AnalyticsQuery::parse_date_range(Some("2024-02-01"), Some("2024-01-01")).is_err()
        );
        // 非法格式报错
        assert!(AnalyticsQuery::parse_date_range(Some("01/02/2024"), None).is_err());
    }

    #[test]
    fn test_ranked_percentages() {
        let stats = ranked(
            vec![
                ("https://a.example".to_string(), 75),
                ("https://b.example".to_string(), 25),
            ],
            10,
        );
        assert_eq!(stats[0].percentage, 75.0);
        assert_eq!(stats[1].percentage, 25.0);

        // top-N 截断但占比仍按全量算
        let stats = ranked(
            vec![
                ("a".to_string(), 50),
                ("b".to_string(), 30),
                ("c".to_string(), 20),
            ],
            2,
        );
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].percentage, 50.0);
    }

    #[test]
    fn test_zero_fill() {
        let start = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = "2024-01-01T03:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let rows = vec![(
            "2024-01-01T01:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            5,
        )];

        let series = zero_fill(rows, start, end, Granularity::Hour);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].hits, 0);
        assert_eq!(series[1].hits, 5);
        assert_eq!(series[2].hits, 0);
        assert_eq!(series[3].hits, 0);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!(Granularity::parse("minute"), Some(Granularity::Minute));
        assert_eq!(Granularity::parse("hour"), Some(Granularity::Hour));
        assert_eq!(Granularity::parse("day"), Some(Granularity::Day));
        assert_eq!(Granularity::parse("week"), None);
    }
}
