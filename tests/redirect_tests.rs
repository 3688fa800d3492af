//! Redirect dispatch tests
//!
//! The hot path: code → 301/302 redirect, with expiry, open-redirect
//! defense and background hit accounting.

use std::sync::Arc;
use std::sync::Mutex;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use hoplink::analytics::enrich::NullGeoProvider;
use hoplink::api::services::RedirectApiService;
use hoplink::cache::{MemoryCache, RedirectCache};
use hoplink::config::{DatabaseConfig, FeatureConfig};
use hoplink::events::{HitEvent, HitEventBus};
use hoplink::services::{RedirectDispatcher, UrlService};
use hoplink::storage::{SeaOrmStorage, UrlRecord};

/// Captures published events instead of a real bus
struct RecordingBus {
    events: Mutex<Vec<HitEvent>>,
}

impl RecordingBus {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn published(&self) -> Vec<HitEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl HitEventBus for RecordingBus {
    async fn publish(&self, event: HitEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn topic(&self) -> &str {
        "url.hits"
    }
}

struct TestEnv {
    _dir: TempDir,
    storage: Arc<SeaOrmStorage>,
    dispatcher: Arc<RedirectDispatcher>,
    bus: Arc<RecordingBus>,
    service: Arc<UrlService>,
}

async fn setup() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("redirect_test.db");
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
        cache,
        None,
        &FeatureConfig::default(),
        "http://sho.rt",
        3600,
    ));

    let bus = Arc::new(RecordingBus::new());
    let dispatcher = Arc::new(RedirectDispatcher::new(
        Arc::clone(&service),
        bus.clone() as Arc<dyn HitEventBus>,
        Arc::new(NullGeoProvider),
    ));

    TestEnv {
        _dir: dir,
        storage,
        dispatcher,
        bus,
        service,
    }
}

/// Insert a record directly, bypassing ingestion validation
async fn insert_record(storage: &SeaOrmStorage, code: &str, original: &str) {
    let now = Utc::now();
    let record = UrlRecord {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        original: original.to_string(),
        normalized: format!("{}#{}", original, code),
        hit_count: 0,
        custom_alias: None,
        expires_at: None,
        created_at: now,
        updated_at: now,
        creator_ip: None,
        creator_user_agent: None,
        metadata: None,
    };
    storage.insert(&record).await.expect("insert failed");
}

fn test_app(
    env: &TestEnv,
) -> (
    web::Data<Arc<RedirectDispatcher>>,
    web::Data<Arc<UrlService>>,
) {
    (
        web::Data::new(Arc::clone(&env.dispatcher)),
        web::Data::new(Arc::clone(&env.service)),
    )
}

#[actix_web::test]
async fn test_redirect_found_302() {
    let env = setup().await;
    insert_record(&env.storage, "go302aa", "https://example.com/landing").await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    let resp = test::call_service(&app, TestRequest::get().uri("/go302aa").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://example.com/landing"
    );
    assert_eq!(
        resp.headers().get("Cache-Control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(resp.headers().get("Pragma").unwrap(), "no-cache");
    assert_eq!(
        resp.headers().get("X-Robots-Tag").unwrap(),
        "noindex, nofollow"
    );
}

#[actix_web::test]
async fn test_redirect_stable_host_301() {
    let env = setup().await;
    insert_record(&env.storage, "go301aa", "https://github.com/rust-lang/rust").await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    let resp = test::call_service(&app, TestRequest::get().uri("/go301aa").to_request()).await;
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
}

#[actix_web::test]
async fn test_redirect_not_found_404() {
    let env = setup().await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    let resp = test::call_service(&app, TestRequest::get().uri("/missing1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_redirect_expired_410() {
    let env = setup().await;
    let now = Utc::now();
    let record = UrlRecord {
        id: Uuid::new_v4().to_string(),
        code: "expired1".to_string(),
        original: "https://example.com/old".to_string(),
        normalized: "https://example.com/old".to_string(),
        hit_count: 0,
        custom_alias: None,
        expires_at: Some(now - Duration::hours(1)),
        created_at: now - Duration::days(1),
        updated_at: now - Duration::days(1),
        creator_ip: None,
        creator_user_agent: None,
        metadata: None,
    };
    env.storage.insert(&record).await.unwrap();

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route("/{code}/preview", web::get().to(RedirectApiService::preview))
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    let resp = test::call_service(&app, TestRequest::get().uri("/expired1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::GONE);

    // preview 仍然可见，带 isExpired: true
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/expired1/preview").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["isExpired"], true);
}

#[actix_web::test]
async fn test_invalid_code_400() {
    let env = setup().await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    // 太短
    let resp = test::call_service(&app, TestRequest::get().uri("/ab").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // 非法字符
    let resp = test::call_service(&app, TestRequest::get().uri("/bad.code").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_open_redirect_defense() {
    let env = setup().await;
    insert_record(&env.storage, "loopbk1", "http://127.0.0.1/x").await;
    insert_record(&env.storage, "privat1", "http://10.0.0.8/x").await;
    insert_record(&env.storage, "suspc1a", "https://free-stuff.tk/win").await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    for code in ["loopbk1", "privat1", "suspc1a"] {
        let resp = test::call_service(
            &app,
            TestRequest::get().uri(&format!("/{}", code)).to_request(),
        )
        .await;
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {}",
            code
        );
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_REDIRECT");
    }
}

#[actix_web::test]
async fn test_hit_accounting_fires_in_background() {
    let env = setup().await;
    insert_record(&env.storage, "tracked1", "https://example.com/tracked").await;

    let (dispatcher, service) = test_app(&env);
    let app = test::init_service(
        App::new()
            .app_data(dispatcher)
            .app_data(service)
            .route(
                "/{code}",
                web::get().to(RedirectApiService::handle_redirect),
            ),
    )
    .await;

    let req = TestRequest::get()
        .uri("/tracked1")
        .insert_header(("user-agent", "Mozilla/5.0 test"))
        .insert_header(("x-forwarded-for", "203.0.113.7"))
        .insert_header(("referer", "https://news.example.org/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // 副作用在后台任务里，等它跑完
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let record = env
        .storage
        .find_by_code("tracked1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.hit_count, 1);

    let events = env.bus.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, "tracked1");
    assert_eq!(events[0].ip, "203.0.113.7");
    assert_eq!(
        events[0].referrer.as_deref(),
        Some("https://news.example.org/")
    );
}
