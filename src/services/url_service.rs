//! URL ingestion service
//!
//! Orchestrates validation, reputation check, normalization, dedup,
//! code allocation, persistence and cache priming. Owns the §record
//! invariants: unique code / unique normalized, custom alias == code,
//! expiry strictly in the future at creation time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::RedirectCache;
use crate::config::FeatureConfig;
use crate::errors::{HoplinkError, Result};
use crate::services::code_allocator::CodeAllocator;
use crate::services::reputation::{ScanVerdict, UrlScanner};
use crate::storage::{
    CachedTarget, InsertOutcome, SeaOrmStorage, UniqueField, UrlFilter, UrlRecord, UrlStats,
};
use crate::utils::normalizer::normalize_url;
use crate::utils::url_validator::validate_url;

/// Request to create a short URL
#[derive(Debug, Clone, Default)]
pub struct CreateUrlRequest {
    pub url: String,
    pub custom_alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub creator_ip: Option<String>,
    pub creator_user_agent: Option<String>,
}

/// Result of short URL creation
#[derive(Debug, Clone)]
pub struct CreateUrlResult {
    pub code: String,
    pub short_url: String,
    pub original: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_new: bool,
}

pub struct UrlService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn RedirectCache>,
    allocator: CodeAllocator,
    scanner: Option<Arc<dyn UrlScanner>>,
    base_url: String,
    max_url_length: usize,
    cache_ttl: u64,
}

impl UrlService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<dyn RedirectCache>,
        scanner: Option<Arc<dyn UrlScanner>>,
        features: &FeatureConfig,
        base_url: &str,
        cache_ttl: u64,
    ) -> Self {
        let allocator = CodeAllocator::new(
            Arc::clone(&storage),
            features.default_code_length.clamp(4, 16),
            features.alias_min_length,
            features.alias_max_length,
        );

        Self {
            storage,
            cache,
            allocator,
            scanner,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_url_length: features.max_url_length,
            cache_ttl,
        }
    }

    fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    fn result_from(&self, record: &UrlRecord, is_new: bool) -> CreateUrlResult {
        CreateUrlResult {
            code: record.code.clone(),
            short_url: self.short_url(&record.code),
            original: record.original.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            is_new,
        }
    }

    /// Prime the redirect cache with a fresh record (best effort)
    async fn prime_cache(&self, record: &UrlRecord) {
        if let Some(ttl) = record.cache_ttl(self.cache_ttl) {
            self.cache
                .set_with_ttl(&record.code, CachedTarget::from(record), ttl)
                .await;
        }
    }

    // ============ create ============

    /// Create a short URL (or return the existing record for a duplicate)
    pub async fn create_short(&self, req: CreateUrlRequest) -> Result<CreateUrlResult> {
        validate_url(&req.url, self.max_url_length)?;

        if let Some(expires_at) = req.expires_at
            && expires_at <= Utc::now()
        {
            return Err(HoplinkError::expiry_in_past(
                "expiresAt must be in the future",
            ));
        }

        // 信誉检查：只有明确标记才拒绝；服务失败 fail-open
        if let Some(ref scanner) = self.scanner {
            match scanner.scan(&req.url).await {
                Ok(ScanVerdict::Flagged(reason)) => {
                    warn!("URL blocked by reputation service: {}", reason);
                    return Err(HoplinkError::url_blocked(reason));
                }
                Ok(ScanVerdict::Clean) => {}
                Err(e) => {
                    warn!("Reputation service unavailable, allowing URL: {}", e);
                }
            }
        }

        let normalized = normalize_url(&req.url);

        // 去重预检：已有可解析记录直接复用，不做任何变更。
        // 过期的持有者不在这里处理，插入冲突路径统一驱逐。
        if let Some(existing) = self.storage.find_by_normalized(&normalized).await?
            && existing.is_resolvable()
        {
            return Ok(self.result_from(&existing, false));
        }

        let has_alias = req
            .custom_alias
            .as_deref()
            .is_some_and(|alias| !alias.is_empty());
        let mut code = self.allocator.allocate(req.custom_alias.as_deref()).await?;

        // 插入循环，重试均有上限：随机码撞车重分配一次；normalized 冲突
        // 若持有者可解析则按并发重复返回赢家，若已过期则驱逐一次后重插
        let mut code_retry = true;
        let mut evict_retry = true;
        loop {
            let record = self.build_record(&req, code.clone(), normalized.clone());
            match self.storage.insert(&record).await? {
                InsertOutcome::Inserted => {
                    self.prime_cache(&record).await;
                    info!(
                        "Short url created: {} -> {} (alias: {})",
                        record.code, record.original, has_alias
                    );
                    return Ok(self.result_from(&record, true));
                }
                InsertOutcome::Conflict(UniqueField::Code) => {
                    if has_alias {
                        // 别名在预检和插入之间被抢注
                        return Err(HoplinkError::alias_taken(format!(
                            "Alias '{}' is already in use",
                            record.code
                        )));
                    }
                    if !code_retry {
                        return Err(HoplinkError::internal(
                            "Code collision persisted after retry",
                        ));
                    }
                    code_retry = false;
                    code = self.allocator.allocate(None).await?;
                }
                InsertOutcome::Conflict(UniqueField::Normalized) => {
                    if !evict_retry {
                        return Err(HoplinkError::internal(
                            "Normalized slot still contended after eviction",
                        ));
                    }
                    evict_retry = false;

                    match self.storage.find_by_normalized(&normalized).await? {
                        // 并发创建同一目标：双方拿到同一个 code
                        Some(existing) if existing.is_resolvable() => {
                            return Ok(self.result_from(&existing, false));
                        }
                        // 过期记录霸占 normalized 槽位：驱逐后重插
                        Some(expired) => {
                            warn!(
                                "Evicting expired record '{}' holding normalized slot",
                                expired.code
                            );
                            self.delete_by_code(&expired.code).await?;
                        }
                        // 持有者已被并发删除，槽位空出，直接重插
                        None => {}
                    }
                }
            }
        }
    }

    fn build_record(
        &self,
        req: &CreateUrlRequest,
        code: String,
        normalized: String,
    ) -> UrlRecord {
        let now = Utc::now();
        let custom_alias = req
            .custom_alias
            .clone()
            .filter(|alias| !alias.is_empty())
            .map(|_| code.clone());

        UrlRecord {
            id: Uuid::new_v4().to_string(),
            code,
            original: req.url.clone(),
            normalized,
            hit_count: 0,
            custom_alias,
            expires_at: req.expires_at,
            created_at: now,
            updated_at: now,
            creator_ip: req.creator_ip.clone(),
            creator_user_agent: req.creator_user_agent.clone(),
            metadata: req.metadata.clone(),
        }
    }

    // ============ resolve / read ============

    /// Cache-first resolution for the redirect path
    ///
    /// On a cache miss the authoritative record repopulates the cache.
    pub async fn resolve(&self, code: &str) -> Result<Option<CachedTarget>> {
        if let Some(target) = self.cache.get(code).await {
            if let Some(metrics) = crate::metrics::get_metrics() {
                metrics.inc_cache_hit();
            }
            return Ok(Some(target));
        }

        if let Some(metrics) = crate::metrics::get_metrics() {
            metrics.inc_cache_miss();
        }

        match self.storage.find_by_code(code).await? {
            Some(record) => {
                let target = CachedTarget::from(&record);
                if let Some(ttl) = record.cache_ttl(self.cache_ttl) {
                    self.cache.set_with_ttl(code, target.clone(), ttl).await;
                }
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// Full record lookup (preview / admin surfaces)
    pub async fn find_by_code(&self, code: &str) -> Result<Option<UrlRecord>> {
        self.storage.find_by_code(code).await
    }

    // ============ delete ============

    /// Delete a record, then invalidate the cache
    ///
    /// Cache invalidation failure surfaces as 503: the record is already
    /// gone from the store, and a retried delete returns false (404).
    pub async fn delete_by_code(&self, code: &str) -> Result<bool> {
        let deleted = self.storage.delete(code).await?;
        if deleted {
            self.cache.invalidate(code).await?;
            info!("Short url deleted: {}", code);
        }
        Ok(deleted)
    }

    // ============ hit accounting ============

    /// Best-effort hit counter bump; never fails the caller
    ///
    /// The cache snapshot is refreshed opportunistically so previews don't
    /// lag too far behind.
    pub async fn increment_hit_count(&self, code: &str, delta: i64) {
        if let Err(e) = self.storage.increment_hit_count(code, delta).await {
            warn!("Hit count increment failed for '{}': {}", code, e);
            return;
        }

        if let Some(mut target) = self.cache.get(code).await {
            target.hit_count += delta;
            self.cache.set_with_ttl(code, target, self.cache_ttl).await;
        }
    }

    // ============ list / stats ============

    pub async fn list(&self, filter: &UrlFilter) -> Result<(Vec<UrlRecord>, u64)> {
        self.storage.list(filter).await
    }

    pub async fn stats(&self) -> Result<UrlStats> {
        self.storage.stats().await
    }
}
