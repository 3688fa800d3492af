//! 限流中间件
//!
//! 固定窗口计数，挂在创建路由前面的预过滤器。计数原语由缓存适配器
//! 提供（redis INCR+EXPIRE 或内存窗口），缓存故障时放行。

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::debug;

use crate::cache::RedirectCache;
use crate::config::RateLimitConfig;
use crate::utils::ip::extract_forwarded_ip;

#[derive(Clone)]
pub struct RateLimit {
    cache: Arc<dyn RedirectCache>,
    window_secs: u64,
    max_requests: u64,
}

impl RateLimit {
    pub fn new(cache: Arc<dyn RedirectCache>, config: &RateLimitConfig) -> Self {
        Self {
            cache,
            window_secs: config.window_secs,
            max_requests: config.max_requests,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            cache: Arc::clone(&self.cache),
            window_secs: self.window_secs,
            max_requests: self.max_requests,
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    cache: Arc<dyn RedirectCache>,
    window_secs: u64,
    max_requests: u64,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
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

        // 只限创建（POST）；读路径不消耗窗口预算
        if req.method() != actix_web::http::Method::POST {
            return Box::pin(async move {
                let response = srv.call(req).await?.map_into_left_body();
                Ok(response)
            });
        }

        let cache = Arc::clone(&self.cache);
        let window_secs = self.window_secs;
        let max_requests = self.max_requests;

        let client_key = extract_forwarded_ip(req.headers())
            .or_else(|| {
                req.connection_info()
                    .peer_addr()
                    .map(|addr| addr.to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Box::pin(async move {
            let count = cache.incr_window(&client_key, window_secs).await;

            if count > max_requests {
                debug!(
                    "Rate limit exceeded for {}: {}/{} in {}s window",
                    client_key, count, max_requests, window_secs
                );
                if let Some(metrics) = crate::metrics::get_metrics() {
                    metrics.inc_rate_limited();
                }
                return Ok(req.into_response(
                    HttpResponse::TooManyRequests()
                        .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                        .insert_header(("Retry-After", window_secs.to_string()))
                        .json(serde_json::json!({
                            "code": "RATE_LIMITED",
                            "message": "Too many requests, slow down"
                        }))
                        .map_into_right_body(),
                ));
            }

            let response = srv.call(req).await?.map_into_left_body();
            Ok(response)
        })
    }
}
