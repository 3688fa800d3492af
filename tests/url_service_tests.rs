//! URL service integration tests
//!
//! Exercises ingestion end-to-end over a real SQLite store: dedup across
//! tracking noise, alias rules, expiry validation and delete semantics.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use hoplink::cache::{MemoryCache, RedirectCache};
use hoplink::config::{DatabaseConfig, FeatureConfig};
use hoplink::errors::HoplinkError;
use hoplink::services::{CreateUrlRequest, UrlService};
use hoplink::storage::{SeaOrmStorage, StatusFilter, UrlFilter, UrlRecord};
use uuid::Uuid;

struct TestEnv {
    _dir: TempDir,
    storage: Arc<SeaOrmStorage>,
    cache: Arc<MemoryCache>,
    service: UrlService,
}

async fn setup() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("url_service_test.db");
    let db_config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let storage = Arc::new(
        SeaOrmStorage::new(&db_config)
            .await
            .expect("Failed to create storage"),
    );
    let cache = Arc::new(MemoryCache::new(1000));

    let service = UrlService::new(
        Arc::clone(&storage),
        cache.clone() as Arc<dyn RedirectCache>,
        None,
        &FeatureConfig::default(),
        "http://sho.rt",
        3600,
    );

    TestEnv {
        _dir: dir,
        storage,
        cache,
        service,
    }
}

fn request(url: &str) -> CreateUrlRequest {
    CreateUrlRequest {
        url: url.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_and_dedup_across_tracking_noise() {
    let env = setup().await;

    let first = env
        .service
        .create_short(request("https://Example.COM/path?utm_source=x&a=1"))
        .await
        .expect("first create failed");
    assert!(first.is_new);
    assert_eq!(first.short_url, format!("http://sho.rt/{}", first.code));

    // 同一逻辑目标、不同营销噪音 → 复用同一条记录
    let second = env
        .service
        .create_short(request("https://example.com/path/?a=1&utm_medium=y"))
        .await
        .expect("second create failed");
    assert!(!second.is_new);
    assert_eq!(second.code, first.code);

    // 存储的 normalized 形态
    let record = env
        .storage
        .find_by_code(&first.code)
        .await
        .unwrap()
        .expect("record missing");
    assert_eq!(record.normalized, "https://example.com/path?a=1");
    // original 原样保存
    assert_eq!(record.original, "https://Example.COM/path?utm_source=x&a=1");
}

#[tokio::test]
async fn test_port_and_trailing_slash_normalization() {
    let env = setup().await;

    let result = env
        .service
        .create_short(request("http://example.com:80/page/"))
        .await
        .unwrap();
    let record = env
        .storage
        .find_by_code(&result.code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.normalized, "http://example.com/page");

    let result = env
        .service
        .create_short(request("https://example.com:443/"))
        .await
        .unwrap();
    let record = env
        .storage
        .find_by_code(&result.code)
        .await
        .unwrap()
        .unwrap();
    // 根路径斜杠保留
    assert_eq!(record.normalized, "https://example.com/");
}

#[tokio::test]
async fn test_custom_alias_and_collision() {
    let env = setup().await;

    let mut req = request("https://a.example.com");
    req.custom_alias = Some("my-link".to_string());
    let result = env.service.create_short(req).await.unwrap();
    assert_eq!(result.code, "my-link");

    let record = env.storage.find_by_code("my-link").await.unwrap().unwrap();
    assert_eq!(record.custom_alias.as_deref(), Some("my-link"));

    // 同一别名指向不同目标 → ALIAS_TAKEN
    let mut req = request("https://b.example.com");
    req.custom_alias = Some("my-link".to_string());
    match env.service.create_short(req).await {
        Err(HoplinkError::AliasTaken(_)) => {}
        other => panic!("expected AliasTaken, got {:?}", other.map(|r| r.code)),
    }
}

#[tokio::test]
async fn test_invalid_aliases() {
    let env = setup().await;

    for alias in ["ab", "bad char", "bad.dot", &"x".repeat(51)] {
        let mut req = request("https://ok.example.com");
        req.custom_alias = Some(alias.to_string());
        match env.service.create_short(req).await {
            Err(HoplinkError::AliasInvalid(_)) => {}
            other => panic!(
                "expected AliasInvalid for '{}', got {:?}",
                alias,
                other.map(|r| r.code)
            ),
        }
    }
}

#[tokio::test]
async fn test_url_validation() {
    let env = setup().await;

    match env.service.create_short(request("ftp://example.com")).await {
        Err(HoplinkError::InvalidUrl(_)) => {}
        other => panic!("expected InvalidUrl, got {:?}", other.map(|r| r.code)),
    }

    let long_url = format!("https://example.com/{}", "a".repeat(3000));
    match env.service.create_short(request(&long_url)).await {
        Err(HoplinkError::UrlTooLong(_)) => {}
        other => panic!("expected UrlTooLong, got {:?}", other.map(|r| r.code)),
    }
}

#[tokio::test]
async fn test_expiry_in_past_rejected() {
    let env = setup().await;

    let mut req = request("https://expires.example.com");
    req.expires_at = Some(Utc::now() - Duration::seconds(60));
    match env.service.create_short(req).await {
        Err(HoplinkError::ExpiryInPast(_)) => {}
        other => panic!("expected ExpiryInPast, got {:?}", other.map(|r| r.code)),
    }
}

#[tokio::test]
async fn test_expired_normalized_holder_evicted_on_insert_conflict() {
    let env = setup().await;
    let now = Utc::now();

    // 直接塞一条已过期的记录占住 normalized 槽位，制造插入冲突
    let holder = UrlRecord {
        id: Uuid::new_v4().to_string(),
        code: "oldcode1".to_string(),
        original: "https://evict.example.com".to_string(),
        normalized: "https://evict.example.com/".to_string(),
        hit_count: 7,
        custom_alias: None,
        expires_at: Some(now - Duration::hours(1)),
        created_at: now - Duration::days(2),
        updated_at: now - Duration::days(2),
        creator_ip: None,
        creator_user_agent: None,
        metadata: None,
    };
    env.storage.insert(&holder).await.unwrap();

    // 同一目标的创建必须成功返回新记录，而不是 5xx
    let result = env
        .service
        .create_short(request("https://evict.example.com"))
        .await
        .expect("create must succeed past the expired holder");
    assert!(result.is_new);
    assert_ne!(result.code, "oldcode1");

    // 过期持有者被驱逐，新记录接管槽位
    assert!(
        env.storage
            .find_by_code("oldcode1")
            .await
            .unwrap()
            .is_none()
    );
    let record = env
        .storage
        .find_by_normalized("https://evict.example.com/")
        .await
        .unwrap()
        .expect("slot must be held by the new record");
    assert_eq!(record.code, result.code);
}

#[tokio::test]
async fn test_expired_record_does_not_block_recreation() {
    let env = setup().await;

    // 先创建一条很快过期的记录
    let mut req = request("https://short-lived.example.com");
    req.expires_at = Some(Utc::now() + Duration::milliseconds(50));
    let first = env.service.create_short(req).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // 记录过期后同一目标可以重新创建（占位记录被驱逐）
    let second = env
        .service
        .create_short(request("https://short-lived.example.com"))
        .await
        .unwrap();
    assert!(second.is_new);
    assert_ne!(second.code, first.code);
}

#[tokio::test]
async fn test_resolve_populates_cache() {
    let env = setup().await;

    let result = env
        .service
        .create_short(request("https://resolve.example.com"))
        .await
        .unwrap();

    // 清掉创建时的 priming，验证 miss → store → repopulate
    env.cache.invalidate(&result.code).await.unwrap();
    assert!(env.cache.get(&result.code).await.is_none());

    let target = env
        .service
        .resolve(&result.code)
        .await
        .unwrap()
        .expect("resolve failed");
    assert_eq!(target.original, "https://resolve.example.com");

    assert!(env.cache.get(&result.code).await.is_some());
}

#[tokio::test]
async fn test_delete_removes_record_and_cache() {
    let env = setup().await;

    let result = env
        .service
        .create_short(request("https://delete-me.example.com"))
        .await
        .unwrap();

    assert!(env.cache.get(&result.code).await.is_some());
    assert!(env.service.delete_by_code(&result.code).await.unwrap());

    assert!(env.cache.get(&result.code).await.is_none());
    assert!(
        env.storage
            .find_by_code(&result.code)
            .await
            .unwrap()
            .is_none()
    );

    // 再删返回 false
    assert!(!env.service.delete_by_code(&result.code).await.unwrap());
}

#[tokio::test]
async fn test_increment_hit_count() {
    let env = setup().await;

    let result = env
        .service
        .create_short(request("https://counted.example.com"))
        .await
        .unwrap();

    env.service.increment_hit_count(&result.code, 1).await;
    env.service.increment_hit_count(&result.code, 1).await;

    let record = env
        .storage
        .find_by_code(&result.code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.hit_count, 2);
}

#[tokio::test]
async fn test_list_and_stats() {
    let env = setup().await;

    env.service
        .create_short(request("https://one.example.com"))
        .await
        .unwrap();
    env.service
        .create_short(request("https://two.example.com"))
        .await
        .unwrap();
    let mut req = request("https://expired.example.com");
    req.expires_at = Some(Utc::now() + Duration::milliseconds(10));
    env.service.create_short(req).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let stats = env.service.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.active, 2);

    let (all, total) = env
        .service
        .list(&UrlFilter {
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(all.len(), 3);

    let (active, total) = env
        .service
        .list(&UrlFilter {
            status: StatusFilter::Active,
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(active.len(), 2);

    // 搜索匹配 original
    let (found, _) = env
        .service
        .list(&UrlFilter {
            search: Some("two.example".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].original, "https://two.example.com");
}

#[tokio::test]
async fn test_concurrent_create_same_target_yields_one_record() {
    let env = setup().await;
    let env = Arc::new(env);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let env = Arc::clone(&env);
        handles.push(tokio::spawn(async move {
            env.service
                .create_short(request("https://contended.example.com"))
                .await
        }));
    }

    let mut codes = std::collections::HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap().expect("create failed");
        codes.insert(result.code);
    }

    // 所有并发请求拿到同一个 code
    assert_eq!(codes.len(), 1);
}
