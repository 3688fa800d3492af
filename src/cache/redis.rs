use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, error, trace};

use crate::cache::RedirectCache;
use crate::config::RedisConfig;
use crate::errors::{HoplinkError, Result};
use crate::storage::CachedTarget;

pub struct RedisCache {
    /// ConnectionManager 自动处理重连
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        debug!(
            "Initializing RedisCache with prefix: '{}'",
            config.key_prefix
        );

        let client = redis::Client::open(config.url.clone()).map_err(|e| {
            HoplinkError::dependency_unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            HoplinkError::dependency_unavailable(format!(
                "Failed to create Redis ConnectionManager: {e}"
            ))
        })?;

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn target_key(&self, code: &str) -> String {
        format!("{}target:{}", self.key_prefix, code)
    }

    fn window_key(&self, key: &str) -> String {
        format!("{}rl:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl RedirectCache for RedisCache {
    async fn get(&self, code: &str) -> Option<CachedTarget> {
        let redis_key = self.target_key(code);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<Option<String>> = conn.get(&redis_key).await;

        match result {
            Ok(Some(data)) => match serde_json::from_str::<CachedTarget>(&data) {
                Ok(target) => {
                    trace!("Cache hit: {}", code);
                    Some(target)
                }
                Err(e) => {
                    error!("Failed to deserialize CachedTarget for '{}': {}", code, e);
                    // 删除损坏的数据
                    let _ = conn.del::<&str, ()>(&redis_key).await;
                    None
                }
            },
            Ok(None) => {
                trace!("Cache miss: {}", code);
                None
            }
            Err(e) => {
                // ConnectionManager 自动处理重连，这里降级为 miss
                error!("Redis get error (will auto-reconnect): {}", e);
                None
            }
        }
    }

    async fn set_with_ttl(&self, code: &str, target: CachedTarget, ttl_secs: u64) {
        let redis_key = self.target_key(code);
        let mut conn = self.connection.clone();

        let serialized = match serde_json::to_string(&target) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to serialize CachedTarget for '{}': {}", code, e);
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<String, String, ()>(redis_key, serialized, ttl_secs)
            .await
        {
            error!("Failed to cache '{}': {}", code, e);
        } else {
            trace!("Cached: {} (TTL: {}s)", code, ttl_secs);
        }
    }

    async fn invalidate(&self, code: &str) -> Result<()> {
        let redis_key = self.target_key(code);
        let mut conn = self.connection.clone();

        conn.del::<String, i32>(redis_key).await.map_err(|e| {
            error!("Failed to invalidate '{}': {}", code, e);
            HoplinkError::dependency_unavailable(format!("Cache invalidation failed: {e}"))
        })?;

        trace!("Invalidated: {}", code);
        Ok(())
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> u64 {
        let redis_key = self.window_key(key);
        let mut conn = self.connection.clone();

        // INCR + 首次设置过期，经典固定窗口
        let count: redis::RedisResult<u64> = conn.incr(&redis_key, 1u64).await;
        match count {
            Ok(count) => {
                if count == 1
                    && let Err(e) = conn
                        .expire::<&str, ()>(redis_key.as_str(), window_secs as i64)
                        .await
                {
                    error!("Failed to set window expiry for '{}': {}", key, e);
                }
                count
            }
            Err(e) => {
                // 限流原语失败时放行（限流是前置过滤器，不是核心路径）
                error!("Redis incr_window error: {}", e);
                0
            }
        }
    }
}
