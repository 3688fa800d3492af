//! 主记录存储适配器（sea-orm）
//!
//! urls 表的读写入口。唯一约束由存储层强制（code / normalized 两条
//! 唯一索引），insert 把约束冲突翻译成类型化的 InsertOutcome，由
//! UrlService 决定冲突语义。

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;

use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub use connection::{connect_generic, connect_sqlite, infer_backend_from_url, run_migrations};
pub use converters::{model_to_record, record_to_active_model};
pub use retry::RetryBudget;

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_budget: RetryBudget,
}

impl SeaOrmStorage {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let backend_name = infer_backend_from_url(&config.url)?;

        let db = if backend_name == "sqlite" {
            connect_sqlite(&config.url).await?
        } else {
            connect_generic(&config.url, config.pool_size, config.timeout).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name,
            retry_budget: RetryBudget::from_config(config),
        };

        // 运行迁移（幂等）
        run_migrations(&storage.db).await?;

        warn!(
            "{} storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    /// 从已建立的连接构造（测试用）
    pub fn from_connection(db: DatabaseConnection, backend_name: &str) -> Self {
        Self {
            db,
            backend_name: backend_name.to_string(),
            retry_budget: RetryBudget::default(),
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn get_backend_name(&self) -> &str {
        &self.backend_name
    }

    pub(crate) fn retry_budget(&self) -> RetryBudget {
        self.retry_budget
    }
}
