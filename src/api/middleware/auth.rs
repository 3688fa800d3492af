//! Admin authentication middleware
//!
//! 配置的 API key 与请求头常数时间比较。未配置 key 时管理路由
//! 整体关闭（404），避免暴露存在性。

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use subtle::ConstantTimeEq;
use tracing::{trace, warn};

#[derive(Clone)]
pub struct AdminAuth {
    api_key: String,
    header_name: String,
}

impl AdminAuth {
    pub fn new(api_key: &str, header_name: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            header_name: header_name.to_ascii_lowercase(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddleware {
            service: Rc::new(service),
            api_key: self.api_key.clone(),
            header_name: self.header_name.clone(),
        }))
    }
}

pub struct AdminAuthMiddleware<S> {
    service: Rc<S>,
    api_key: String,
    header_name: String,
}

impl<S, B> AdminAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    /// key 未配置：按不存在处理
    fn handle_missing_key(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        warn!("Admin API key not configured - returning 404");
        req.into_response(
            HttpResponse::NotFound()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .body("Not Found")
                .map_into_right_body(),
        )
    }

    fn handle_unauthorized(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        warn!("Admin authentication failed - invalid or missing API key");
        if let Some(metrics) = crate::metrics::get_metrics() {
            metrics.inc_auth_failure();
        }
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                .json(serde_json::json!({
                    "message": "Unauthorized: invalid or missing API key"
                }))
                .map_into_right_body(),
        )
    }

    /// 常数时间比较，避免时序侧信道
    fn key_matches(expected: &str, provided: &str) -> bool {
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let api_key = self.api_key.clone();
        let header_name = self.header_name.clone();

        Box::pin(async move {
            if api_key.is_empty() {
                return Ok(Self::handle_missing_key(req));
            }

            let provided = req
                .headers()
                .get(header_name.as_str())
                .and_then(|h| h.to_str().ok())
                .unwrap_or("");

            if !Self::key_matches(&api_key, provided) {
                return Ok(Self::handle_unauthorized(req));
            }

            trace!("Admin authentication successful");
            let response = srv.call(req).await?.map_into_left_body();
            Ok(response)
        })
    }
}
