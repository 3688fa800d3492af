use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::CachedTarget;

/// 重定向缓存适配器
///
/// 一致性：最终一致。管理删除走 invalidate（失败要向上冒泡），
/// 其余写入尽力而为。
#[async_trait]
pub trait RedirectCache: Send + Sync {
    async fn get(&self, code: &str) -> Option<CachedTarget>;

    async fn set_with_ttl(&self, code: &str, target: CachedTarget, ttl_secs: u64);

    /// 管理删除路径的失效；失败冒泡（调用方映射为 5xx）
    async fn invalidate(&self, code: &str) -> Result<()>;

    /// 固定窗口计数原语（限流前置过滤器用）
    ///
    /// 返回窗口内累计计数（含本次）。
    async fn incr_window(&self, key: &str, window_secs: u64) -> u64;
}
