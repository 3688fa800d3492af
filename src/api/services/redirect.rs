//! 重定向入口：GET /{code} 与 GET /{code}/preview
//!
//! 热路径。响应选定后记账与事件发布交给后台任务，这里立即返回。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::error;

use crate::api::types::{PreviewResponse, error_response};
use crate::errors::HoplinkError;
use crate::services::{RedirectContext, RedirectDispatcher, RedirectOutcome, UrlService};
use crate::utils::ip::extract_client_ip;
use crate::utils::is_valid_code;

pub struct RedirectApiService;

impl RedirectApiService {
    fn context_from(req: &HttpRequest) -> RedirectContext {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        };

        RedirectContext {
            ip: extract_client_ip(req),
            user_agent: header("user-agent"),
            referrer: header("referer"),
        }
    }

    /// GET /{code}
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        dispatcher: web::Data<Arc<RedirectDispatcher>>,
    ) -> impl Responder {
        let code = path.into_inner();

        let outcome = match dispatcher.resolve(&code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Redirect resolution failed for '{}': {}", code, e);
                return error_response(&e);
            }
        };

        if let Some(metrics) = crate::metrics::get_metrics() {
            let label = match &outcome {
                RedirectOutcome::Redirect { permanent: true, .. } => "301",
                RedirectOutcome::Redirect { .. } => "302",
                RedirectOutcome::NotFound => "404",
                RedirectOutcome::Gone => "410",
                RedirectOutcome::InvalidCode | RedirectOutcome::InvalidTarget => "400",
            };
            metrics.inc_redirect(label);
        }

        match outcome {
            RedirectOutcome::Redirect {
                location,
                permanent,
            } => {
                // 响应已定，副作用进后台
                dispatcher.record_hit(&code, Self::context_from(&req));

                let status = if permanent {
                    StatusCode::MOVED_PERMANENTLY
                } else {
                    StatusCode::FOUND
                };

                HttpResponse::build(status)
                    .insert_header(("Location", location))
                    .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
                    .insert_header(("Pragma", "no-cache"))
                    .insert_header(("X-Robots-Tag", "noindex, nofollow"))
                    .finish()
            }
            RedirectOutcome::InvalidCode => {
                error_response(&HoplinkError::invalid_code("Malformed code"))
            }
            RedirectOutcome::NotFound => error_response(&HoplinkError::not_found(format!(
                "Code '{}' does not exist",
                code
            ))),
            RedirectOutcome::Gone => {
                error_response(&HoplinkError::gone(format!("Code '{}' has expired", code)))
            }
            RedirectOutcome::InvalidTarget => error_response(&HoplinkError::invalid_redirect(
                "Redirect target rejected by policy",
            )),
        }
    }

    /// GET /{code}/preview
    pub async fn preview(
        path: web::Path<String>,
        service: web::Data<Arc<UrlService>>,
    ) -> impl Responder {
        let code = path.into_inner();

        if !is_valid_code(&code) {
            return error_response(&HoplinkError::invalid_code("Malformed code"));
        }

        match service.find_by_code(&code).await {
            Ok(Some(record)) => HttpResponse::Ok().json(PreviewResponse::from(record)),
            Ok(None) => error_response(&HoplinkError::not_found(format!(
                "Code '{}' does not exist",
                code
            ))),
            Err(e) => error_response(&e),
        }
    }
}
