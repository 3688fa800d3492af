//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Compress, web};
use anyhow::Result;
use tracing::{debug, warn};

use crate::api::middleware::{AdminAuth, RateLimit, RequestIdMiddleware};
use crate::api::services::{
    AnalyticsApiService, HealthApiService, MetricsApiService, RedirectApiService, UrlApiService,
};
use crate::config::CorsConfig;
use crate::runtime::lifetime;

/// Build CORS middleware from configuration
fn build_cors_middleware(cors_config: &CorsConfig) -> Cors {
    if !cors_config.enabled {
        return Cors::permissive();
    }

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS", "HEAD"])
        .allowed_headers(vec!["Content-Type", "Accept", "X-API-Key"])
        .max_age(cors_config.max_age as usize);

    if cors_config.allowed_origins.is_empty() {
        cors = cors.allow_any_origin();
    } else {
        for origin in &cors_config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

/// Run the HTTP server
///
/// 1. Starts adapters in dependency order
/// 2. Configures routes and middleware
/// 3. Waits for the server or a shutdown signal
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &crate::config::AppConfig) -> Result<()> {
    debug!("Starting pre-startup processing...");

    let mut startup = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let url_service = startup.url_service.clone();
    let dispatcher = startup.dispatcher.clone();
    let analytics_query = startup.analytics_query.clone();
    let consumer = startup.consumer.clone();
    let health = startup.health.clone();
    let cache = startup.cache.clone();

    let cors_config = config.cors.clone();
    let rate_limit_config = config.rate_limit.clone();
    let admin_key = config.api.admin_api_key.clone();
    let api_key_header = config.api.api_key_header.clone();

    if admin_key.is_empty() {
        warn!("Admin API is disabled (ADMIN_API_KEY not set)");
    }

    let cpu_count = config.server.cpu_count.min(32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        let cors = build_cors_middleware(&cors_config);
        let admin = AdminAuth::new(&admin_key, &api_key_header);
        let rate_limit = RateLimit::new(cache.clone(), &rate_limit_config);

        App::new()
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(RequestIdMiddleware)
            .app_data(web::Data::new(url_service.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .app_data(web::Data::new(analytics_query.clone()))
            .app_data(web::Data::new(consumer.clone()))
            .app_data(web::Data::new(health.clone()))
            .app_data(web::PayloadConfig::new(1024 * 1024))
            // 管理与创建面
            .service(
                web::resource("/api/urls/batch")
                    .wrap(admin.clone())
                    .route(web::post().to(UrlApiService::batch_create)),
            )
            .service(
                web::resource("/api/urls/stats")
                    .route(web::get().to(UrlApiService::stats)),
            )
            .service(
                web::resource("/api/urls/{code}")
                    .wrap(admin)
                    .route(web::delete().to(UrlApiService::delete)),
            )
            .service(
                web::resource("/api/urls")
                    .wrap(rate_limit)
                    .route(web::post().to(UrlApiService::create))
                    .route(web::get().to(UrlApiService::list)),
            )
            // 分析面
            .service(
                web::resource("/api/analytics/{code}/summary")
                    .route(web::get().to(AnalyticsApiService::get_summary)),
            )
            .service(
                web::resource("/api/analytics/{code}/export")
                    .route(web::get().to(AnalyticsApiService::export)),
            )
            .service(
                web::resource("/api/analytics/{code}")
                    .route(web::get().to(AnalyticsApiService::get_analytics)),
            )
            // 健康与指标
            .service(
                web::resource("/health/liveness")
                    .route(web::get().to(HealthApiService::liveness)),
            )
            .service(
                web::resource("/health/readiness")
                    .route(web::get().to(HealthApiService::readiness)),
            )
            .service(web::resource("/health").route(web::get().to(HealthApiService::health)))
            .service(
                web::resource("/metrics/json").route(web::get().to(MetricsApiService::json)),
            )
            .service(
                web::resource("/metrics").route(web::get().to(MetricsApiService::prometheus)),
            )
            // 重定向热路径（最后注册，避免吞掉具体路由）
            .service(
                web::resource("/{code}/preview")
                    .route(web::get().to(RedirectApiService::preview)),
            )
            .service(
                web::resource("/{code}")
                    .route(web::get().to(RedirectApiService::handle_redirect))
                    .route(web::head().to(RedirectApiService::handle_redirect)),
            )
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server.bind(&bind_address)?.run();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown() => {
            lifetime::shutdown::stop_components(&mut startup).await;
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
