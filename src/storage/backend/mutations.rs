//! 写路径操作
//!
//! insert 的唯一约束冲突在这里翻译成类型化结果，计数更新走单条
//! 原子 UPDATE，不阻塞重定向路径。

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, sea_query::Expr};
use tracing::{error, info, trace};

use super::SeaOrmStorage;
use super::converters::record_to_active_model;
use super::retry::retry_transient;
use crate::errors::{HoplinkError, Result};
use crate::storage::models::{InsertOutcome, UniqueField, UrlRecord};

use migration::entities::url_record;

impl SeaOrmStorage {
    /// 插入记录；code / normalized 唯一冲突返回 Conflict(field)
    pub async fn insert(&self, record: &UrlRecord) -> Result<InsertOutcome> {
        let model = record_to_active_model(record);

        match url_record::Entity::insert(model).exec(&self.db).await {
            Ok(_) => {
                trace!("Inserted url record: {}", record.code);
                Ok(InsertOutcome::Inserted)
            }
            Err(e) => {
                if let Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) = e.sql_err() {
                    // 约束信息里带索引/列名，据此区分冲突字段
                    let field = if msg.contains("normalized") {
                        UniqueField::Normalized
                    } else {
                        UniqueField::Code
                    };
                    return Ok(InsertOutcome::Conflict(field));
                }
                error!("插入短链接失败 {}: {}", record.code, e);
                Err(HoplinkError::from(e))
            }
        }
    }

    /// 删除记录，返回是否有行被删除
    pub async fn delete(&self, code: &str) -> Result<bool> {
        let result = url_record::Entity::delete_many()
            .filter(url_record::Column::Code.eq(code))
            .exec(&self.db)
            .await
            .map_err(|e| {
                error!("删除短链接失败 {}: {}", code, e);
                HoplinkError::from(e)
            })?;

        if result.rows_affected > 0 {
            info!("Url record deleted: {}", code);
        }
        Ok(result.rows_affected > 0)
    }

    /// 原子累加 hit_count（尽力而为，带瞬时错误重试）
    pub async fn increment_hit_count(&self, code: &str, delta: i64) -> Result<()> {
        retry_transient("increment_hit_count", self.retry_budget(), || async {
            url_record::Entity::update_many()
                .col_expr(
                    url_record::Column::HitCount,
                    Expr::col(url_record::Column::HitCount).add(delta),
                )
                .col_expr(
                    url_record::Column::UpdatedAt,
                    Expr::value(chrono::Utc::now()),
                )
                .filter(url_record::Column::Code.eq(code))
                .exec(&self.db)
                .await
                .map(|_| ())
        })
        .await
        .map_err(HoplinkError::from)
    }
}
