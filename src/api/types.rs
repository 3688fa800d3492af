//! HTTP 边界的请求/响应 DTO 与错误映射

use std::collections::HashMap;

use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HoplinkError;
use crate::services::CreateUrlResult;
use crate::storage::{UrlRecord, UrlStats};

/// 统一错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// HoplinkError → HTTP 响应
pub fn error_response(err: &HoplinkError) -> HttpResponse {
    HttpResponse::build(err.status()).json(ErrorBody {
        code: err.code(),
        message: err.message().to_string(),
    })
}

// ============ create ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlBody {
    pub url: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
    /// ISO-8601 绝对时间
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl CreateUrlBody {
    /// 解析 expiresAt；格式错误映射为 VALIDATION
    pub fn parse_expires_at(&self) -> Result<Option<DateTime<Utc>>, HoplinkError> {
        match self.expires_at.as_deref() {
            Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| {
                    HoplinkError::invalid_query(format!("Invalid expiresAt: {}", e))
                }),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlResponse {
    pub code: String,
    pub short_url: String,
    pub original: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_new: bool,
}

impl From<CreateUrlResult> for CreateUrlResponse {
    fn from(result: CreateUrlResult) -> Self {
        Self {
            code: result.code,
            short_url: result.short_url,
            original: result.original,
            created_at: result.created_at,
            expires_at: result.expires_at,
            is_new: result.is_new,
        }
    }
}

// ============ list ============

#[derive(Debug, Deserialize)]
pub struct ListQueryParams {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSummary {
    pub code: String,
    pub short_url: String,
    pub original: String,
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_alias: Option<String>,
    pub is_expired: bool,
}

impl UrlSummary {
    pub fn from_record(record: &UrlRecord, base_url: &str) -> Self {
        Self {
            code: record.code.clone(),
            short_url: format!("{}/{}", base_url.trim_end_matches('/'), record.code),
            original: record.original.clone(),
            hit_count: record.hit_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
            custom_alias: record.custom_alias.clone(),
            is_expired: record.is_expired(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub urls: Vec<UrlSummary>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
}

impl From<UrlStats> for StatsResponse {
    fn from(stats: UrlStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            expired: stats.expired,
        }
    }
}

// ============ batch ============

#[derive(Debug, Deserialize)]
pub struct BatchCreateBody {
    pub urls: Vec<CreateUrlBody>,
}

#[derive(Debug, Serialize)]
pub struct BatchEntryError {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchCreateResponse {
    pub success: Vec<CreateUrlResponse>,
    pub errors: Vec<BatchEntryError>,
}

// ============ preview ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub code: String,
    pub original: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub hit_count: i64,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl From<UrlRecord> for PreviewResponse {
    fn from(record: UrlRecord) -> Self {
        let is_expired = record.is_expired();
        Self {
            code: record.code,
            original: record.original,
            created_at: record.created_at,
            expires_at: record.expires_at,
            hit_count: record.hit_count,
            is_expired,
            metadata: record.metadata,
        }
    }
}

// ============ analytics ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQueryParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub granularity: Option<String>,
    #[serde(default)]
    pub top_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQueryParams {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub granularity: Option<String>,
}
