//! 重定向缓存
//!
//! code → CachedTarget 的低延迟查找层。redis 用于多副本部署，
//! memory 用于单节点 / 测试。

mod memory;
mod redis;
pub mod traits;

use std::sync::Arc;

use tracing::warn;

use crate::config::CacheConfig;
use crate::errors::{HoplinkError, Result};

pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use traits::RedirectCache;

/// 按配置创建缓存实例
pub async fn create(config: &CacheConfig) -> Result<Arc<dyn RedirectCache>> {
    match config.cache_type.as_str() {
        "redis" => {
            let cache = RedisCache::new(&config.redis).await?;
            warn!("Redirect cache: redis ({})", config.redis.url);
            Ok(Arc::new(cache))
        }
        "memory" => {
            warn!(
                "Redirect cache: in-memory (capacity {})",
                config.memory.max_capacity
            );
            Ok(Arc::new(MemoryCache::new(config.memory.max_capacity)))
        }
        other => Err(HoplinkError::internal(format!(
            "Unknown cache type: {}. Supported: redis, memory",
            other
        ))),
    }
}
