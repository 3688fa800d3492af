//! /api/analytics 查询面

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};

use crate::analytics::AnalyticsQuery;
use crate::analytics::query::{DEFAULT_TOP_LIMIT, Granularity};
use crate::api::types::{AnalyticsQueryParams, ExportQueryParams, error_response};
use crate::errors::HoplinkError;
use crate::services::UrlService;
use crate::utils::is_valid_code;

pub struct AnalyticsApiService;

impl AnalyticsApiService {
    fn parse_granularity(raw: Option<&str>) -> Result<Granularity, HoplinkError> {
        match raw {
            None => Ok(Granularity::default()),
            Some(raw) => Granularity::parse(raw).ok_or_else(|| {
                HoplinkError::invalid_query(format!(
                    "Invalid granularity '{}'. Supported: minute, hour, day",
                    raw
                ))
            }),
        }
    }

    /// code 存在性检查：分析查询只对已知 code 响应
    async fn ensure_code_exists(
        service: &UrlService,
        code: &str,
    ) -> Result<(), HoplinkError> {
        if !is_valid_code(code) {
            return Err(HoplinkError::invalid_code("Malformed code"));
        }
        if service.find_by_code(code).await?.is_none() {
            return Err(HoplinkError::not_found(format!(
                "Code '{}' does not exist",
                code
            )));
        }
        Ok(())
    }

    /// GET /api/analytics/{code}
    pub async fn get_analytics(
        path: web::Path<String>,
        query: web::Query<AnalyticsQueryParams>,
        analytics: web::Data<Arc<AnalyticsQuery>>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if let Err(e) = Self::ensure_code_exists(&service, &code).await {
            return error_response(&e);
        }

        let (start, end) = match AnalyticsQuery::parse_date_range(
            query.start_date.as_deref(),
            query.end_date.as_deref(),
        ) {
            Ok(range) => range,
            Err(e) => return error_response(&e),
        };

        let granularity = match Self::parse_granularity(query.granularity.as_deref()) {
            Ok(granularity) => granularity,
            Err(e) => return error_response(&e),
        };

        let top_limit = query.top_limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, 100);

        match analytics
            .get_analytics(&code, start, end, granularity, top_limit)
            .await
        {
            Ok(report) => HttpResponse::Ok().json(report),
            Err(e) => error_response(&e),
        }
    }

    /// GET /api/analytics/{code}/summary
    pub async fn get_summary(
        path: web::Path<String>,
        analytics: web::Data<Arc<AnalyticsQuery>>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if let Err(e) = Self::ensure_code_exists(&service, &code).await {
            return error_response(&e);
        }

        match analytics.get_summary(&code).await {
            Ok(summary) => HttpResponse::Ok().json(summary),
            Err(e) => error_response(&e),
        }
    }

    /// GET /api/analytics/{code}/export?format=csv|json
    pub async fn export(
        path: web::Path<String>,
        query: web::Query<ExportQueryParams>,
        analytics: web::Data<Arc<AnalyticsQuery>>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if let Err(e) = Self::ensure_code_exists(&service, &code).await {
            return error_response(&e);
        }

        let (start, end) = match AnalyticsQuery::parse_date_range(
            query.start_date.as_deref(),
            query.end_date.as_deref(),
        ) {
            Ok(range) => range,
            Err(e) => return error_response(&e),
        };

        let granularity = match Self::parse_granularity(query.granularity.as_deref()) {
            Ok(granularity) => granularity,
            Err(e) => return error_response(&e),
        };

        let series = match analytics.time_series(&code, start, end, granularity).await {
            Ok(series) => series,
            Err(e) => return error_response(&e),
        };

        match query.format.as_deref().unwrap_or("json") {
            "csv" => {
                let mut csv = String::from("timestamp,hits\n");
                for point in &series {
                    csv.push_str(&format!("{},{}\n", point.bucket.to_rfc3339(), point.hits));
                }
                HttpResponse::Ok()
                    .insert_header(("Content-Type", "text/csv; charset=utf-8"))
                    .insert_header((
                        "Content-Disposition",
                        format!("attachment; filename=\"{}.csv\"", code),
                    ))
                    .body(csv)
            }
            "json" => HttpResponse::Ok().json(serde_json::json!({
                "code": code,
                "startDate": start,
                "endDate": end,
                "timeSeries": series,
            })),
            other => error_response(&HoplinkError::invalid_query(format!(
                "Invalid export format '{}'. Supported: csv, json",
                other
            ))),
        }
    }
}
