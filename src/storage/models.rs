use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 短链接记录（主存储的行，只由 UrlService 变更）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: String,
    pub code: String,
    pub original: String,
    pub normalized: String,
    pub hit_count: i64,
    pub custom_alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_ip: Option<String>,
    pub creator_user_agent: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl UrlRecord {
    /// 检查记录是否已过期
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    /// 可解析：expires_at 为空或在未来
    pub fn is_resolvable(&self) -> bool {
        !self.is_expired()
    }

    /// 计算缓存 TTL（秒），已过期返回 None
    pub fn cache_ttl(&self, default_ttl: u64) -> Option<u64> {
        match self.expires_at {
            Some(exp) => {
                let now = Utc::now();
                if exp <= now {
                    None
                } else {
                    let remaining = (exp - now).num_seconds() as u64;
                    Some(remaining.min(default_ttl))
                }
            }
            None => Some(default_ttl),
        }
    }
}

/// 缓存中的重定向快照（从 UrlRecord 派生，最终一致）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTarget {
    pub code: String,
    pub original: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub hit_count: i64,
}

impl From<&UrlRecord> for CachedTarget {
    fn from(record: &UrlRecord) -> Self {
        Self {
            code: record.code.clone(),
            original: record.original.clone(),
            expires_at: record.expires_at,
            hit_count: record.hit_count,
        }
    }
}

impl CachedTarget {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}

/// 列表查询的状态过滤
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Expired,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// 列表查询的排序字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    HitCount,
    Original,
    Code,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            "hitCount" => Some(Self::HitCount),
            "original" => Some(Self::Original),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// 列表查询参数
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    /// 模糊匹配 code 或 original
    pub search: Option<String>,
    pub status: StatusFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub offset: u64,
    pub limit: u64,
}

/// 全局统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct UrlStats {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
}

/// insert 的冲突字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Code,
    Normalized,
}

/// insert 结果：成功或唯一约束冲突
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Conflict(UniqueField),
}
