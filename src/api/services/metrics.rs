//! /metrics 路由组：Prometheus 文本格式 + JSON 镜像

use actix_web::{HttpResponse, Responder};

use crate::metrics::get_metrics;

pub struct MetricsApiService;

impl MetricsApiService {
    /// GET /metrics
    pub async fn prometheus() -> impl Responder {
        match get_metrics() {
            Some(metrics) => match metrics.export() {
                Ok(body) => HttpResponse::Ok()
                    .insert_header(("Content-Type", "text/plain; version=0.0.4; charset=utf-8"))
                    .body(body),
                Err(e) => HttpResponse::InternalServerError().body(e),
            },
            None => HttpResponse::ServiceUnavailable().body("metrics not initialized"),
        }
    }

    /// GET /metrics/json
    pub async fn json() -> impl Responder {
        match get_metrics() {
            Some(metrics) => HttpResponse::Ok().json(metrics.export_json()),
            None => HttpResponse::ServiceUnavailable()
                .json(serde_json::json!({ "error": "metrics not initialized" })),
        }
    }
}
