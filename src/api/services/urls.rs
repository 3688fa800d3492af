//! /api/urls 管理面

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::debug;

use crate::api::types::{
    BatchCreateBody, BatchCreateResponse, BatchEntryError, CreateUrlBody, CreateUrlResponse,
    ListQueryParams, ListResponse, StatsResponse, UrlSummary, error_response,
};
use crate::config::get_config;
use crate::errors::HoplinkError;
use crate::services::{CreateUrlRequest, UrlService};
use crate::storage::{SortField, SortOrder, StatusFilter, UrlFilter};
use crate::utils::ip::extract_client_ip;

/// 单批最大条目数
const MAX_BATCH_ENTRIES: usize = 100;

const DEFAULT_PAGE_LIMIT: u64 = 20;
const MAX_PAGE_LIMIT: u64 = 100;

pub struct UrlApiService;

impl UrlApiService {
    fn build_request(req: &HttpRequest, body: CreateUrlBody) -> Result<CreateUrlRequest, HoplinkError> {
        let expires_at = body.parse_expires_at()?;

        Ok(CreateUrlRequest {
            url: body.url,
            custom_alias: body.custom_alias,
            expires_at,
            metadata: body.metadata,
            creator_ip: extract_client_ip(req),
            creator_user_agent: req
                .headers()
                .get("user-agent")
                .and_then(|h| h.to_str().ok())
                .map(String::from),
        })
    }

    /// POST /api/urls
    pub async fn create(
        req: HttpRequest,
        body: web::Json<CreateUrlBody>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let request = match Self::build_request(&req, body.into_inner()) {
            Ok(request) => request,
            Err(e) => return error_response(&e),
        };

        match service.create_short(request).await {
            Ok(result) => HttpResponse::Created().json(CreateUrlResponse::from(result)),
            Err(e) => error_response(&e),
        }
    }

    /// GET /api/urls
    pub async fn list(
        query: web::Query<ListQueryParams>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);

        let sort = match query.sort.as_deref() {
            None => SortField::default(),
            Some(raw) => match SortField::parse(raw) {
                Some(sort) => sort,
                None => {
                    return error_response(&HoplinkError::invalid_query(format!(
                        "Invalid sort field: {}",
                        raw
                    )));
                }
            },
        };

        let order = match query.order.as_deref() {
            None => SortOrder::default(),
            Some(raw) => match SortOrder::parse(raw) {
                Some(order) => order,
                None => {
                    return error_response(&HoplinkError::invalid_query(format!(
                        "Invalid sort order: {}",
                        raw
                    )));
                }
            },
        };

        let status = match query.status.as_deref() {
            None => StatusFilter::default(),
            Some(raw) => match StatusFilter::parse(raw) {
                Some(status) => status,
                None => {
                    return error_response(&HoplinkError::invalid_query(format!(
                        "Invalid status filter: {}",
                        raw
                    )));
                }
            },
        };

        let filter = UrlFilter {
            search: query.search.clone().filter(|s| !s.is_empty()),
            status,
            sort,
            order,
            offset: (page - 1) * limit,
            limit,
        };

        match service.list(&filter).await {
            Ok((records, total)) => {
                let base_url = &get_config().server.base_url;
                let urls: Vec<UrlSummary> = records
                    .iter()
                    .map(|r| UrlSummary::from_record(r, base_url))
                    .collect();

                let total_pages = total.div_ceil(limit).max(1);
                debug!("Listed {} urls (page {}/{})", urls.len(), page, total_pages);

                HttpResponse::Ok().json(ListResponse {
                    urls,
                    total,
                    page,
                    limit,
                    total_pages,
                    has_next: page < total_pages,
                    has_prev: page > 1,
                })
            }
            Err(e) => error_response(&e),
        }
    }

    /// GET /api/urls/stats
    pub async fn stats(service: web::Data<Arc<UrlService>>) -> impl Responder {
        match service.stats().await {
            Ok(stats) => HttpResponse::Ok().json(StatsResponse::from(stats)),
            Err(e) => error_response(&e),
        }
    }

    /// DELETE /api/urls/{code}（管理路由）
    pub async fn delete(
        path: web::Path<String>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        match service.delete_by_code(&code).await {
            Ok(true) => HttpResponse::NoContent().finish(),
            Ok(false) => error_response(&HoplinkError::not_found(format!(
                "Code '{}' does not exist",
                code
            ))),
            Err(e) => error_response(&e),
        }
    }

    /// POST /api/urls/batch（管理路由）
    ///
    /// 逐条处理：单条失败不中断整批，错误按条目返回。
    pub async fn batch_create(
        req: HttpRequest,
        body: web::Json<BatchCreateBody>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let entries = body.into_inner().urls;

        if entries.is_empty() {
            return error_response(&HoplinkError::invalid_query("Batch is empty"));
        }
        if entries.len() > MAX_BATCH_ENTRIES {
            return error_response(&HoplinkError::invalid_query(format!(
                "Batch exceeds {} entries",
                MAX_BATCH_ENTRIES
            )));
        }

        let mut success = Vec::new();
        let mut errors = Vec::new();

        for entry in entries {
            let url = entry.url.clone();
            let request = match Self::build_request(&req, entry) {
                Ok(request) => request,
                Err(e) => {
                    errors.push(BatchEntryError {
                        url,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match service.create_short(request).await {
                Ok(result) => success.push(CreateUrlResponse::from(result)),
                Err(e) => errors.push(BatchEntryError {
                    url,
                    error: e.to_string(),
                }),
            }
        }

        debug!(
            "Batch create: {} succeeded, {} failed",
            success.len(),
            errors.len()
        );
        HttpResponse::Created().json(BatchCreateResponse { success, errors })
    }
}
