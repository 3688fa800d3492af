use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;

use crate::cache::RedirectCache;
use crate::errors::Result;
use crate::storage::CachedTarget;

/// 进程内缓存（单节点 / 开发模式）
///
/// moka 承载目标快照，条目级 TTL 通过存 deadline 实现；
/// 固定窗口计数用 DashMap。
pub struct MemoryCache {
    inner: Cache<String, (CachedTarget, Instant)>,
    windows: DashMap<String, (Instant, u64)>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(Duration::from_secs(300))
            .build();
        Self {
            inner,
            windows: DashMap::new(),
        }
    }
}

#[async_trait]
impl RedirectCache for MemoryCache {
    async fn get(&self, code: &str) -> Option<CachedTarget> {
        match self.inner.get(code).await {
            Some((target, deadline)) => {
                if Instant::now() >= deadline {
                    self.inner.invalidate(code).await;
                    None
                } else {
                    Some(target)
                }
            }
            None => None,
        }
    }

    async fn set_with_ttl(&self, code: &str, target: CachedTarget, ttl_secs: u64) {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.inner.insert(code.to_string(), (target, deadline)).await;
    }

    async fn invalidate(&self, code: &str) -> Result<()> {
        self.inner.invalidate(code).await;
        Ok(())
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> u64 {
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let mut entry = self.windows.entry(key.to_string()).or_insert((now, 0));
        let (start, count) = *entry;
        if now.duration_since(start) >= window {
            *entry = (now, 1);
            1
        } else {
            *entry = (start, count + 1);
            count + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn target(code: &str) -> CachedTarget {
        CachedTarget {
            code: code.to_string(),
            original: "https://example.com/".to_string(),
            expires_at: None,
            hit_count: 0,
        }
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = MemoryCache::new(100);

        assert!(cache.get("abc1234").await.is_none());

        cache.set_with_ttl("abc1234", target("abc1234"), 60).await;
        let hit = cache.get("abc1234").await.expect("expected cache hit");
        assert_eq!(hit.code, "abc1234");

        cache.invalidate("abc1234").await.unwrap();
        assert!(cache.get("abc1234").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_ttl_expiry() {
        let cache = MemoryCache::new(100);
        cache.set_with_ttl("abc1234", target("abc1234"), 0).await;
        // deadline 为当下，读取即过期
        assert!(cache.get("abc1234").await.is_none());
    }

    #[tokio::test]
    async fn test_incr_window() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.incr_window("203.0.113.1", 60).await, 1);
        assert_eq!(cache.incr_window("203.0.113.1", 60).await, 2);
        assert_eq!(cache.incr_window("203.0.113.2", 60).await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_carries_expiry() {
        let cache = MemoryCache::new(100);
        let mut t = target("abc1234");
        t.expires_at = Some(Utc::now() - chrono::Duration::hours(1));
        cache.set_with_ttl("abc1234", t, 60).await;

        // 缓存层不判断业务过期，由调用方判断
        let hit = cache.get("abc1234").await.expect("expected cache hit");
        assert!(hit.is_expired());
    }
}
