//! /health 路由组

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use tracing::trace;

use crate::analytics::AnalyticsConsumer;
use crate::services::HealthService;

pub struct HealthApiService;

impl HealthApiService {
    /// GET /health：进程 + 依赖状态
    pub async fn health(
        health: web::Data<Arc<HealthService>>,
        consumer: web::Data<Arc<AnalyticsConsumer>>,
    ) -> impl Responder {
        let report = health.check(consumer.state()).await;

        let status = if report.status == "healthy" {
            actix_web::http::StatusCode::OK
        } else {
            actix_web::http::StatusCode::SERVICE_UNAVAILABLE
        };

        HttpResponse::build(status).json(report)
    }

    /// GET /health/liveness：进程活着即 204
    pub async fn liveness() -> impl Responder {
        trace!("Liveness probe");
        HttpResponse::NoContent().finish()
    }

    /// GET /health/readiness：同步依赖可达才就绪
    pub async fn readiness(health: web::Data<Arc<HealthService>>) -> impl Responder {
        if health.ready().await {
            HttpResponse::Ok()
                .insert_header(("Content-Type", "text/plain"))
                .body("OK")
        } else {
            HttpResponse::ServiceUnavailable()
                .insert_header(("Content-Type", "text/plain"))
                .body("NOT READY")
        }
    }
}
