//! 启动编排
//!
//! 按依赖顺序拉起各适配器：存储 → 缓存 → 事件总线 → 分析存储 →
//! 消费端 → 业务服务。停止顺序相反（见 shutdown.rs）。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::analytics::enrich::build_geo_provider;
use crate::analytics::{AnalyticsConsumer, AnalyticsQuery, AnalyticsStore, LogDeadLetterSink};
use crate::cache::{self, RedirectCache};
use crate::config::get_config;
use crate::errors::Result;
use crate::events::{HitEventBus, PartitionedBus};
use crate::services::{HealthService, HttpScanner, RedirectDispatcher, UrlScanner, UrlService};
use crate::storage::SeaOrmStorage;

pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub cache: Arc<dyn RedirectCache>,
    pub url_service: Arc<UrlService>,
    pub dispatcher: Arc<RedirectDispatcher>,
    pub analytics_query: Arc<AnalyticsQuery>,
    pub consumer: Arc<AnalyticsConsumer>,
    pub health: Arc<HealthService>,
    /// retention 等后台任务句柄，停机时 abort
    pub background_tasks: Vec<JoinHandle<()>>,
}

/// 准备服务器启动的上下文
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let config = get_config();

    if let Err(e) = crate::metrics::init_metrics() {
        warn!("Metrics initialization failed: {}", e);
    }

    // 1. 主存储（含迁移）
    let storage = Arc::new(SeaOrmStorage::new(&config.database).await?);

    // 2. 重定向缓存
    let cache = cache::create(&config.cache).await?;

    // 3. 事件总线
    let bus = Arc::new(PartitionedBus::new(&config.events));
    debug!(
        "Event bus ready: topic '{}', {} partitions",
        bus.topic(),
        bus.partition_count()
    );

    // 4. 分析存储 + 消费端
    let analytics_store = Arc::new(AnalyticsStore::new((*storage).clone()));
    let consumer = Arc::new(AnalyticsConsumer::new(
        Arc::clone(&analytics_store),
        Arc::new(LogDeadLetterSink),
        &config.analytics,
    ));
    consumer.start(&bus).await?;

    // 5. 业务服务
    let scanner: Option<Arc<dyn UrlScanner>> =
        if config.features.enable_url_scanning && !config.features.scanner_api_url.is_empty() {
            warn!("URL reputation scanning enabled");
            Some(Arc::new(HttpScanner::new(&config.features.scanner_api_url)))
        } else {
            None
        };

    let url_service = Arc::new(UrlService::new(
        Arc::clone(&storage),
        Arc::clone(&cache),
        scanner,
        &config.features,
        &config.server.base_url,
        config.cache.default_ttl,
    ));

    let geo: Arc<dyn crate::analytics::enrich::GeoIpLookup> =
        build_geo_provider(&config.analytics.geoip_api_url).into();

    let dispatcher = Arc::new(RedirectDispatcher::new(
        Arc::clone(&url_service),
        bus as Arc<dyn HitEventBus>,
        geo,
    ));

    let analytics_query = Arc::new(AnalyticsQuery::new(Arc::clone(&analytics_store)));
    let health = Arc::new(HealthService::new(Arc::clone(&storage)));

    // 6. retention 清扫任务
    let mut background_tasks = Vec::new();
    {
        let store = Arc::clone(&analytics_store);
        let interval = Duration::from_secs(config.analytics.retention_sweep_interval.max(60));
        let minute_ttl = config.analytics.minute_ttl_days;
        let visitor_ttl = config.analytics.visitor_ttl_days;

        background_tasks.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = store.sweep_expired(minute_ttl, visitor_ttl).await {
                    warn!("Retention sweep failed: {}", e);
                }
            }
        }));
    }

    warn!("All components started");

    Ok(StartupContext {
        storage,
        cache,
        url_service,
        dispatcher,
        analytics_query,
        consumer,
        health,
        background_tasks,
    })
}
