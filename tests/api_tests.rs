//! HTTP surface tests
//!
//! Management + analytics routes over a real SQLite store, including the
//! admin API-key gate and the rate-limit pre-filter.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use tempfile::TempDir;

use hoplink::analytics::{AnalyticsQuery, AnalyticsStore};
use hoplink::api::middleware::{AdminAuth, RateLimit};
use hoplink::api::services::{AnalyticsApiService, UrlApiService};
use hoplink::cache::{MemoryCache, RedirectCache};
use hoplink::config::{AppConfig, DatabaseConfig, FeatureConfig, RateLimitConfig, init_config_with};
use hoplink::services::UrlService;
use hoplink::storage::SeaOrmStorage;

struct TestEnv {
    _dir: TempDir,
    service: Arc<UrlService>,
    analytics: Arc<AnalyticsQuery>,
    cache: Arc<dyn RedirectCache>,
}

async fn setup() -> TestEnv {
    init_config_with(AppConfig::default());

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("api_test.db");
    let db_config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let storage = Arc::new(
        SeaOrmStorage::new(&db_config)
            .await
            .expect("Failed to create storage"),
    );
    let cache: Arc<dyn RedirectCache> = Arc::new(MemoryCache::new(1000));

    let service = Arc::new(UrlService::new(
        Arc::clone(&storage),
        Arc::clone(&cache),
        None,
        &FeatureConfig::default(),
        "http://localhost:8080",
        3600,
    ));

    let analytics_store = Arc::new(AnalyticsStore::new((*storage).clone()));
    let analytics = Arc::new(AnalyticsQuery::new(analytics_store));

    TestEnv {
        _dir: dir,
        service,
        analytics,
        cache,
    }
}

macro_rules! api_app {
    ($env:expr, $admin_key:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::clone(&$env.service)))
                .app_data(web::Data::new(Arc::clone(&$env.analytics)))
                .service(
                    web::resource("/api/urls/batch")
                        .wrap(AdminAuth::new($admin_key, "X-API-Key"))
                        .route(web::post().to(UrlApiService::batch_create)),
                )
                .service(
                    web::resource("/api/urls/stats")
                        .route(web::get().to(UrlApiService::stats)),
                )
                .service(
                    web::resource("/api/urls/{code}")
                        .wrap(AdminAuth::new($admin_key, "X-API-Key"))
                        .route(web::delete().to(UrlApiService::delete)),
                )
                .service(
                    web::resource("/api/urls")
                        .route(web::post().to(UrlApiService::create))
                        .route(web::get().to(UrlApiService::list)),
                )
                .service(
                    web::resource("/api/analytics/{code}")
                        .route(web::get().to(AnalyticsApiService::get_analytics)),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_create_url_201_and_dedup() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({ "url": "https://example.com/page" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["isNew"], true);
    assert_eq!(body["original"], "https://example.com/page");
    let code = body["code"].as_str().unwrap().to_string();
    assert!(body["shortUrl"].as_str().unwrap().ends_with(&code));

    // 重复提交 → 同一 code, isNew=false
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({ "url": "https://example.com/page?utm_source=tw" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["isNew"], false);
    assert_eq!(body["code"], code.as_str());
}

#[actix_web::test]
async fn test_create_validation_errors() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    // 非法 scheme
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({ "url": "ftp://example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_URL");

    // 过期时间在过去
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({
            "url": "https://example.com/x",
            "expiresAt": "2020-01-01T00:00:00Z"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "EXPIRY_IN_PAST");

    // 别名冲突
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({
            "url": "https://a.example.com",
            "customAlias": "taken-alias"
        }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({
            "url": "https://b.example.com",
            "customAlias": "taken-alias"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "ALIAS_TAKEN");
}

#[actix_web::test]
async fn test_list_pagination_shape() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    for i in 0..5 {
        let req = TestRequest::post()
            .uri("/api/urls")
            .set_json(serde_json::json!({ "url": format!("https://example.com/item/{}", i) }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CREATED
        );
    }

    let req = TestRequest::get()
        .uri("/api/urls?page=1&limit=2&sort=createdAt&order=DESC")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["hasNext"], true);
    assert_eq!(body["hasPrev"], false);
    assert_eq!(body["urls"].as_array().unwrap().len(), 2);

    // 非法排序字段 → 400
    let req = TestRequest::get().uri("/api/urls?sort=bogus").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = TestRequest::get().uri("/api/urls/stats").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["active"], 5);
    assert_eq!(body["expired"], 0);
}

#[actix_web::test]
async fn test_admin_auth_gate() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({ "url": "https://admin.example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let code = body["code"].as_str().unwrap().to_string();

    // 缺 key → 401
    let req = TestRequest::delete()
        .uri(&format!("/api/urls/{}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Unauthorized"));

    // 错 key → 401
    let req = TestRequest::delete()
        .uri(&format!("/api/urls/{}", code))
        .insert_header(("X-API-Key", "wrong"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    // 对 key → 204
    let req = TestRequest::delete()
        .uri(&format!("/api/urls/{}", code))
        .insert_header(("X-API-Key", "secret-key"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    // 已删除 → 404
    let req = TestRequest::delete()
        .uri(&format!("/api/urls/{}", code))
        .insert_header(("X-API-Key", "secret-key"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_admin_disabled_when_key_missing() {
    let env = setup().await;
    // key 未配置 → 管理路由 404
    let app = api_app!(&env, "");

    let req = TestRequest::delete().uri("/api/urls/anycode").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_batch_create() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    let req = TestRequest::post()
        .uri("/api/urls/batch")
        .insert_header(("X-API-Key", "secret-key"))
        .set_json(serde_json::json!({
            "urls": [
                { "url": "https://batch.example.com/1" },
                { "url": "https://batch.example.com/2" },
                { "url": "ftp://bad.example.com" }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"].as_array().unwrap().len(), 2);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"][0]["url"], "ftp://bad.example.com");

    // 未认证 → 401
    let req = TestRequest::post()
        .uri("/api/urls/batch")
        .set_json(serde_json::json!({ "urls": [{ "url": "https://x.example.com" }] }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn test_analytics_endpoint_validation() {
    let env = setup().await;
    let app = api_app!(&env, "secret-key");

    // 未知 code → 404
    let req = TestRequest::get()
        .uri("/api/analytics/unknowncd")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    // 已知 code → 200，空数据也要给零值结构
    let req = TestRequest::post()
        .uri("/api/urls")
        .set_json(serde_json::json!({ "url": "https://analytics.example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let code = body["code"].as_str().unwrap().to_string();

    let req = TestRequest::get()
        .uri(&format!("/api/analytics/{}", code))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["totalHits"], 0);
    assert!(body["timeSeries"].is_array());

    // 非法粒度 → 400
    let req = TestRequest::get()
        .uri(&format!("/api/analytics/{}?granularity=week", code))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    // 倒置日期区间 → 400
    let req = TestRequest::get()
        .uri(&format!(
            "/api/analytics/{}?startDate=2024-02-01&endDate=2024-01-01",
            code
        ))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn test_rate_limit_pre_filter() {
    let env = setup().await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(Arc::clone(&env.service)))
            .service(
                web::resource("/api/urls")
                    .wrap(RateLimit::new(
                        Arc::clone(&env.cache),
                        &RateLimitConfig {
                            window_secs: 60,
                            max_requests: 2,
                        },
                    ))
                    .route(web::post().to(UrlApiService::create))
                    .route(web::get().to(UrlApiService::list)),
            ),
    )
    .await;

    for i in 0..2 {
        let req = TestRequest::post()
            .uri("/api/urls")
            .insert_header(("x-forwarded-for", "203.0.113.50"))
            .set_json(serde_json::json!({ "url": format!("https://rl.example.com/{}", i) }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CREATED
        );
    }

    // 窗口预算用完 → 429
    let req = TestRequest::post()
        .uri("/api/urls")
        .insert_header(("x-forwarded-for", "203.0.113.50"))
        .set_json(serde_json::json!({ "url": "https://rl.example.com/3" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("Retry-After").unwrap(), "60");

    // 其他客户端不受影响
    let req = TestRequest::post()
        .uri("/api/urls")
        .insert_header(("x-forwarded-for", "203.0.113.51"))
        .set_json(serde_json::json!({ "url": "https://rl.example.com/other" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CREATED
    );
}
