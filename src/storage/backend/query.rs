//! Query operations for SeaOrmStorage
//!
//! This module contains all read-only database operations.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use tracing::error;

use super::SeaOrmStorage;
use super::converters::model_to_record;
use crate::errors::{HoplinkError, Result};
use crate::storage::models::{SortField, SortOrder, StatusFilter, UrlFilter, UrlRecord, UrlStats};

use migration::entities::url_record;

impl SeaOrmStorage {
    /// 按 code 查询
    pub async fn find_by_code(&self, code: &str) -> Result<Option<UrlRecord>> {
        let model = url_record::Entity::find()
            .filter(url_record::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(|e| {
                error!("查询短链接失败 {}: {}", code, e);
                HoplinkError::from(e)
            })?;

        Ok(model.map(model_to_record))
    }

    /// 按 normalized 查询（去重路径）
    pub async fn find_by_normalized(&self, normalized: &str) -> Result<Option<UrlRecord>> {
        let model = url_record::Entity::find()
            .filter(url_record::Column::Normalized.eq(normalized))
            .one(&self.db)
            .await
            .map_err(|e| {
                error!("按 normalized 查询失败: {}", e);
                HoplinkError::from(e)
            })?;

        Ok(model.map(model_to_record))
    }

    /// 带过滤条件的分页查询，返回 (page, total)
    pub async fn list(&self, filter: &UrlFilter) -> Result<(Vec<UrlRecord>, u64)> {
        let now = Utc::now();
        let mut condition = Condition::all();

        // search: 模糊匹配 code 或 original
        if let Some(ref search) = filter.search {
            condition = condition.add(
                Condition::any()
                    .add(url_record::Column::Code.contains(search))
                    .add(url_record::Column::Original.contains(search)),
            );
        }

        match filter.status {
            StatusFilter::All => {}
            StatusFilter::Expired => {
                condition = condition
                    .add(url_record::Column::ExpiresAt.is_not_null())
                    .add(url_record::Column::ExpiresAt.lte(now));
            }
            StatusFilter::Active => {
                condition = condition.add(
                    Condition::any()
                        .add(url_record::Column::ExpiresAt.is_null())
                        .add(url_record::Column::ExpiresAt.gt(now)),
                );
            }
        }

        let base = url_record::Entity::find().filter(condition);

        let total = base.clone().count(&self.db).await.map_err(|e| {
            error!("列表 COUNT 查询失败: {}", e);
            HoplinkError::from(e)
        })?;

        let column = match filter.sort {
            SortField::CreatedAt => url_record::Column::CreatedAt,
            SortField::UpdatedAt => url_record::Column::UpdatedAt,
            SortField::HitCount => url_record::Column::HitCount,
            SortField::Original => url_record::Column::Original,
            SortField::Code => url_record::Column::Code,
        };

        let query = match filter.order {
            SortOrder::Asc => base.order_by_asc(column),
            SortOrder::Desc => base.order_by_desc(column),
        };

        let models = query
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("分页查询失败: {}", e);
                HoplinkError::from(e)
            })?;

        Ok((models.into_iter().map(model_to_record).collect(), total))
    }

    /// 全局统计
    ///
    /// expired 只统计 expires_at 非空且已过期的记录；active = total - expired。
    pub async fn stats(&self) -> Result<UrlStats> {
        let now = Utc::now();

        let total = url_record::Entity::find()
            .count(&self.db)
            .await
            .map_err(HoplinkError::from)?;

        let expired = url_record::Entity::find()
            .filter(url_record::Column::ExpiresAt.is_not_null())
            .filter(url_record::Column::ExpiresAt.lte(now))
            .count(&self.db)
            .await
            .map_err(HoplinkError::from)?;

        Ok(UrlStats {
            total,
            active: total - expired,
            expired,
        })
    }

    /// 记录总数（健康检查探针）
    pub async fn count(&self) -> Result<u64> {
        url_record::Entity::find()
            .count(&self.db)
            .await
            .map_err(HoplinkError::from)
    }
}
