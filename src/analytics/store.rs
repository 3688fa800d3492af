//! 分析计数存储
//!
//! 按 code 分区的七张计数表。所有写入都是交换律操作（累加 upsert、
//! min/max upsert、insert-ignore），at-least-once 投递下可以安全重试。

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, DatabaseBackend, EntityTrait, QueryFilter, QueryOrder,
    sea_query::{Expr, OnConflict},
};
use tracing::debug;

use crate::errors::{HoplinkError, Result};
use crate::events::HitEvent;
use crate::storage::SeaOrmStorage;
use crate::storage::backend::retry::{RetryBudget, retry_transient};
use crate::utils::visitor_hash;

use migration::entities::{
    access_times, device_stats, geo_stats, hits_by_hour, hits_by_minute, referrer_stats,
    unique_visitors,
};

use super::{DIRECT, UNKNOWN, truncate_to_hour, truncate_to_minute};

/// 计数存储
///
/// 复用主存储的连接；分析表和 urls 表在同一个库里，但写入方互不重叠
/// （urls 只有 UrlService 写，计数表只有消费端写）。
pub struct AnalyticsStore {
    storage: SeaOrmStorage,
    retry_budget: RetryBudget,
}

impl AnalyticsStore {
    pub fn new(storage: SeaOrmStorage) -> Self {
        let retry_budget = storage.retry_budget();
        Self {
            storage,
            retry_budget,
        }
    }

    fn backend(&self) -> DatabaseBackend {
        match self.storage.get_backend_name() {
            "mysql" => DatabaseBackend::MySql,
            "postgres" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        }
    }

    // ============ 写路径（消费端） ============

    /// 应用单条命中事件的全部计数增量
    pub async fn apply_hit(&self, event: &HitEvent) -> Result<()> {
        self.apply_batch(std::slice::from_ref(event)).await
    }

    /// 批量应用：先在内存聚合，再按表做批量 upsert
    pub async fn apply_batch(&self, events: &[HitEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut hour_counts: HashMap<(String, DateTime<Utc>), i64> = HashMap::new();
        let mut minute_counts: HashMap<(String, DateTime<Utc>), i64> = HashMap::new();
        let mut referrer_counts: HashMap<(String, String), i64> = HashMap::new();
        let mut geo_counts: HashMap<(String, String), i64> = HashMap::new();
        let mut device_counts: HashMap<(String, String, String, String), i64> = HashMap::new();

        for event in events {
            let code = event.code.clone();
            *hour_counts
                .entry((code.clone(), truncate_to_hour(event.timestamp)))
                .or_insert(0) += 1;
            *minute_counts
                .entry((code.clone(), truncate_to_minute(event.timestamp)))
                .or_insert(0) += 1;

            // referrer: 只统计真实来源，"direct" 不进表
            if let Some(ref referrer) = event.referrer
                && !referrer.is_empty()
                && referrer != DIRECT
            {
                *referrer_counts
                    .entry((code.clone(), referrer.clone()))
                    .or_insert(0) += 1;
            }

            if let Some(ref country) = event.country
                && !country.is_empty()
            {
                *geo_counts
                    .entry((code.clone(), country.clone()))
                    .or_insert(0) += 1;
            }

            // devices 总是计数，缺失维度填 unknown
            let device = event
                .device_type
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string());
            let browser = event.browser.clone().unwrap_or_else(|| UNKNOWN.to_string());
            let os = event.os.clone().unwrap_or_else(|| UNKNOWN.to_string());
            *device_counts
                .entry((code, device, browser, os))
                .or_insert(0) += 1;
        }

        self.upsert_hour_counts(&hour_counts).await?;
        self.upsert_minute_counts(&minute_counts).await?;
        self.upsert_referrer_counts(&referrer_counts).await?;
        self.upsert_geo_counts(&geo_counts).await?;
        self.upsert_device_counts(&device_counts).await?;

        debug!("Applied {} hit events to analytics store", events.len());
        Ok(())
    }

    /// 累加表达式：click 计数列在冲突时做 `col = col + excluded.col`
    fn accumulate_conflict<C>(&self, keys: Vec<C>, count_col: C, count_name: &str) -> OnConflict
    where
        C: sea_orm::sea_query::IntoIden + Copy + 'static,
    {
        let addend = match self.backend() {
            DatabaseBackend::MySql => Expr::cust(format!("VALUES({})", count_name)),
            _ => Expr::cust(format!("excluded.{}", count_name)),
        };
        OnConflict::columns(keys)
            .value(count_col, Expr::col(count_col).add(addend))
            .to_owned()
    }

    async fn upsert_hour_counts(
        &self,
        counts: &HashMap<(String, DateTime<Utc>), i64>,
    ) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let models: Vec<hits_by_hour::ActiveModel> = counts
            .iter()
            .map(|((code, bucket), count)| hits_by_hour::ActiveModel {
                code: Set(code.clone()),
                hour_bucket: Set(*bucket),
                hit_count: Set(*count),
                ..Default::default()
            })
            .collect();

        let on_conflict = self.accumulate_conflict(
            vec![
                hits_by_hour::Column::Code,
                hits_by_hour::Column::HourBucket,
            ],
            hits_by_hour::Column::HitCount,
            "hit_count",
        );

        retry_transient("upsert_hour_counts", self.retry_budget, || async {
            hits_by_hour::Entity::insert_many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    async fn upsert_minute_counts(
        &self,
        counts: &HashMap<(String, DateTime<Utc>), i64>,
    ) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let models: Vec<hits_by_minute::ActiveModel> = counts
            .iter()
            .map(|((code, bucket), count)| hits_by_minute::ActiveModel {
                code: Set(code.clone()),
                minute_bucket: Set(*bucket),
                hit_count: Set(*count),
                ..Default::default()
            })
            .collect();

        let on_conflict = self.accumulate_conflict(
            vec![
                hits_by_minute::Column::Code,
                hits_by_minute::Column::MinuteBucket,
            ],
            hits_by_minute::Column::HitCount,
            "hit_count",
        );

        retry_transient("upsert_minute_counts", self.retry_budget, || async {
            hits_by_minute::Entity::insert_many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    async fn upsert_referrer_counts(&self, counts: &HashMap<(String, String), i64>) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let models: Vec<referrer_stats::ActiveModel> = counts
            .iter()
            .map(|((code, referrer), count)| referrer_stats::ActiveModel {
                code: Set(code.clone()),
                referrer: Set(referrer.clone()),
                hit_count: Set(*count),
                ..Default::default()
            })
            .collect();

        let on_conflict = self.accumulate_conflict(
            vec![
                referrer_stats::Column::Code,
                referrer_stats::Column::Referrer,
            ],
            referrer_stats::Column::HitCount,
            "hit_count",
        );

        retry_transient("upsert_referrer_counts", self.retry_budget, || async {
            referrer_stats::Entity::insert_many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    async fn upsert_geo_counts(&self, counts: &HashMap<(String, String), i64>) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let models: Vec<geo_stats::ActiveModel> = counts
            .iter()
            .map(|((code, country), count)| geo_stats::ActiveModel {
                code: Set(code.clone()),
                country: Set(country.clone()),
                hit_count: Set(*count),
                ..Default::default()
            })
            .collect();

        let on_conflict = self.accumulate_conflict(
            vec![geo_stats::Column::Code, geo_stats::Column::Country],
            geo_stats::Column::HitCount,
            "hit_count",
        );

        retry_transient("upsert_geo_counts", self.retry_budget, || async {
            geo_stats::Entity::insert_many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    async fn upsert_device_counts(
        &self,
        counts: &HashMap<(String, String, String, String), i64>,
    ) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }

        let models: Vec<device_stats::ActiveModel> = counts
            .iter()
            .map(
                |((code, device, browser, os), count)| device_stats::ActiveModel {
                    code: Set(code.clone()),
                    device_type: Set(device.clone()),
                    browser: Set(browser.clone()),
                    os: Set(os.clone()),
                    hit_count: Set(*count),
                    ..Default::default()
                },
            )
            .collect();

        let on_conflict = self.accumulate_conflict(
            vec![
                device_stats::Column::Code,
                device_stats::Column::DeviceType,
                device_stats::Column::Browser,
                device_stats::Column::Os,
            ],
            device_stats::Column::HitCount,
            "hit_count",
        );

        retry_transient("upsert_device_counts", self.retry_budget, || async {
            device_stats::Entity::insert_many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    /// 更新首次/末次访问时间：first_at 取 min，last_at 取 max
    pub async fn touch_access_times(&self, code: &str, t: DateTime<Utc>) -> Result<()> {
        let model = access_times::ActiveModel {
            code: Set(code.to_string()),
            first_at: Set(t),
            last_at: Set(t),
        };

        let (first_expr, last_expr) = match self.backend() {
            DatabaseBackend::MySql => (
                Expr::cust("LEAST(first_at, VALUES(first_at))"),
                Expr::cust("GREATEST(last_at, VALUES(last_at))"),
            ),
            DatabaseBackend::Postgres => (
                Expr::cust("LEAST(access_times.first_at, excluded.first_at)"),
                Expr::cust("GREATEST(access_times.last_at, excluded.last_at)"),
            ),
            // SQLite 的标量 min/max 接受两个参数
            _ => (
                Expr::cust("min(first_at, excluded.first_at)"),
                Expr::cust("max(last_at, excluded.last_at)"),
            ),
        };

        let on_conflict = OnConflict::column(access_times::Column::Code)
            .value(access_times::Column::FirstAt, first_expr)
            .value(access_times::Column::LastAt, last_expr)
            .to_owned();

        retry_transient("touch_access_times", self.retry_budget, || async {
            access_times::Entity::insert(model.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }

    /// 幂等登记唯一访客；重复投递不会增大集合
    pub async fn record_unique_visitor(
        &self,
        code: &str,
        date: NaiveDate,
        ip: &str,
        user_agent: &str,
    ) -> Result<()> {
        let model = unique_visitors::ActiveModel {
            code: Set(code.to_string()),
            visit_date: Set(date),
            visitor_hash: Set(visitor_hash(ip, user_agent)),
            seen_at: Set(Utc::now()),
            ..Default::default()
        };

        let on_conflict = OnConflict::columns([
            unique_visitors::Column::Code,
            unique_visitors::Column::VisitDate,
            unique_visitors::Column::VisitorHash,
        ])
        .do_nothing()
        .to_owned();

        retry_transient("record_unique_visitor", self.retry_budget, || async {
            // do_nothing + 冲突时 sea-orm 报 RecordNotInserted，对我们就是成功
            match unique_visitors::Entity::insert(model.clone())
                .on_conflict(on_conflict.clone())
                .exec(self.storage.get_db())
                .await
            {
                Ok(_) => Ok(()),
                Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(HoplinkError::from)
    }

    // ============ 读路径（查询层） ============

    /// 小时桶时间序列，升序
    pub async fn hits_by_hour(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, i64)>> {
        let rows = hits_by_hour::Entity::find()
            .filter(hits_by_hour::Column::Code.eq(code))
            .filter(hits_by_hour::Column::HourBucket.gte(start))
            .filter(hits_by_hour::Column::HourBucket.lte(end))
            .order_by_asc(hits_by_hour::Column::HourBucket)
            .all(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(rows.into_iter().map(|r| (r.hour_bucket, r.hit_count)).collect())
    }

    /// 分钟桶时间序列，升序
    pub async fn hits_by_minute(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, i64)>> {
        let rows = hits_by_minute::Entity::find()
            .filter(hits_by_minute::Column::Code.eq(code))
            .filter(hits_by_minute::Column::MinuteBucket.gte(start))
            .filter(hits_by_minute::Column::MinuteBucket.lte(end))
            .order_by_asc(hits_by_minute::Column::MinuteBucket)
            .all(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.minute_bucket, r.hit_count))
            .collect())
    }

    /// 来源计数，按计数降序
    pub async fn referrers(&self, code: &str) -> Result<Vec<(String, i64)>> {
        let rows = referrer_stats::Entity::find()
            .filter(referrer_stats::Column::Code.eq(code))
            .order_by_desc(referrer_stats::Column::HitCount)
            .all(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(rows.into_iter().map(|r| (r.referrer, r.hit_count)).collect())
    }

    /// 国家计数，按计数降序
    pub async fn geographic(&self, code: &str) -> Result<Vec<(String, i64)>> {
        let rows = geo_stats::Entity::find()
            .filter(geo_stats::Column::Code.eq(code))
            .order_by_desc(geo_stats::Column::HitCount)
            .all(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(rows.into_iter().map(|r| (r.country, r.hit_count)).collect())
    }

    /// 设备维度行
    pub async fn devices(&self, code: &str) -> Result<Vec<(String, String, String, i64)>> {
        let rows = device_stats::Entity::find()
            .filter(device_stats::Column::Code.eq(code))
            .order_by_desc(device_stats::Column::HitCount)
            .all(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.device_type, r.browser, r.os, r.hit_count))
            .collect())
    }

    /// 首次/末次访问时间
    pub async fn access_times(
        &self,
        code: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row = access_times::Entity::find_by_id(code)
            .one(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        Ok(row.map(|r| (r.first_at, r.last_at)))
    }

    /// 范围内唯一访客数（按 code + 日期范围统计集合成员）
    pub async fn unique_visitor_count(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        unique_visitors::Entity::find()
            .filter(unique_visitors::Column::Code.eq(code))
            .filter(unique_visitors::Column::VisitDate.gte(start))
            .filter(unique_visitors::Column::VisitDate.lte(end))
            .count(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)
    }

    // ============ retention ============

    /// 清理超过保留窗口的行（分钟表 30 天，访客集合 90 天）
    pub async fn sweep_expired(&self, minute_ttl_days: i64, visitor_ttl_days: i64) -> Result<u64> {
        let minute_cutoff = Utc::now() - Duration::days(minute_ttl_days);
        let visitor_cutoff = (Utc::now() - Duration::days(visitor_ttl_days)).date_naive();

        let minutes = hits_by_minute::Entity::delete_many()
            .filter(hits_by_minute::Column::MinuteBucket.lt(minute_cutoff))
            .exec(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        let visitors = unique_visitors::Entity::delete_many()
            .filter(unique_visitors::Column::VisitDate.lt(visitor_cutoff))
            .exec(self.storage.get_db())
            .await
            .map_err(HoplinkError::from)?;

        let total = minutes.rows_affected + visitors.rows_affected;
        if total > 0 {
            debug!(
                "Retention sweep removed {} minute rows, {} visitor rows",
                minutes.rows_affected, visitors.rows_affected
            );
        }
        Ok(total)
    }
}
