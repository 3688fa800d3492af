//! 数据库连接建立与迁移

use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::debug;

use crate::errors::{HoplinkError, Result};

/// 建立 SQLite 连接（单文件场景的保守连接参数）
pub async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_string());
    opt.max_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        HoplinkError::dependency_unavailable(format!("Failed to connect to SQLite: {}", e))
    })
}

/// 建立 MySQL / PostgreSQL 连接
pub async fn connect_generic(
    database_url: &str,
    pool_size: u32,
    timeout_secs: u64,
) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_string());
    opt.max_connections(pool_size)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        HoplinkError::dependency_unavailable(format!("Failed to connect to database: {}", e))
    })
}

/// 运行 schema 迁移（幂等）
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| HoplinkError::internal(format!("Migration failed: {}", e)))?;
    debug!("Database migrations applied");
    Ok(())
}

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(HoplinkError::internal(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend() {
        assert_eq!(
            infer_backend_from_url("sqlite://x.db?mode=rwc").unwrap(),
            "sqlite"
        );
        assert_eq!(
            infer_backend_from_url("postgres://u@h/db").unwrap(),
            "postgres"
        );
        assert_eq!(infer_backend_from_url("mysql://u@h/db").unwrap(), "mysql");
        assert!(infer_backend_from_url("mongodb://nope").is_err());
    }
}
