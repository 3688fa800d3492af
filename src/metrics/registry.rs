//! Global metrics registry
//!
//! Defines all Prometheus metrics used in the application.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use prometheus::proto::MetricType;
use std::sync::OnceLock;

/// Global metrics instance (initialized explicitly via `init_metrics()`)
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the global metrics registry.
///
/// Returns `Ok(())` if metrics were successfully created and registered,
/// or if they were already initialized. Returns `Err` on Prometheus errors.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = Metrics::try_new()?;
    // Another thread may have initialized between our check and here; that's fine.
    let _ = METRICS.set(metrics);
    Ok(())
}

/// Get a reference to the global metrics, if initialized.
pub fn get_metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Application metrics container
pub struct Metrics {
    registry: Registry,
    started_at: std::time::Instant,

    // ===== HTTP 指标 =====
    /// HTTP 请求延迟直方图
    pub http_request_duration_seconds: HistogramVec,
    /// HTTP 请求总数
    pub http_requests_total: CounterVec,

    // ===== 重定向指标 =====
    /// Total number of redirects by outcome (301/302/404/410/400)
    pub redirects_total: CounterVec,

    // ===== 事件总线指标 =====
    /// 成功发布的命中事件数
    pub events_published_total: Counter,
    /// 退避耗尽或通道关闭后丢弃的事件数
    pub events_dropped_total: CounterVec,

    // ===== 消费端指标 =====
    /// 成功应用到计数存储的事件数
    pub consumer_applied_total: Counter,
    /// 死信事件数
    pub consumer_dead_letter_total: CounterVec,
    /// 单次 flush 的批大小分布
    pub consumer_flush_size: Histogram,

    // ===== 缓存指标 =====
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,

    // ===== 限流与认证 =====
    pub rate_limited_total: Counter,
    pub auth_failures_total: Counter,

    // ===== 系统指标 =====
    /// Build information (version label, value always 1.0)
    pub build_info: prometheus::GaugeVec,
    /// Server uptime in seconds
    pub uptime_seconds: Gauge,
}

impl Metrics {
    fn try_new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "hoplink_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["method", "endpoint", "status"],
        )?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "hoplink_http_requests_total",
                "Total number of HTTP requests",
            ),
            &["method", "endpoint", "status"],
        )?;

        let redirects_total = CounterVec::new(
            Opts::new(
                "hoplink_redirects_total",
                "Total number of redirect resolutions by outcome",
            ),
            &["outcome"],
        )?;

        let events_published_total = Counter::new(
            "hoplink_events_published_total",
            "Total number of hit events published to the bus",
        )?;

        let events_dropped_total = CounterVec::new(
            Opts::new(
                "hoplink_events_dropped_total",
                "Total number of hit events dropped after publish backoff exhaustion",
            ),
            &["reason"],
        )?;

        let consumer_applied_total = Counter::new(
            "hoplink_consumer_applied_total",
            "Total number of hit events applied to the analytics store",
        )?;

        let consumer_dead_letter_total = CounterVec::new(
            Opts::new(
                "hoplink_consumer_dead_letter_total",
                "Total number of hit events routed to the dead-letter sink",
            ),
            &["reason"],
        )?;

        let consumer_flush_size = Histogram::with_opts(
            HistogramOpts::new(
                "hoplink_consumer_flush_size",
                "Number of events per consumer flush",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;

        let cache_hits_total =
            Counter::new("hoplink_cache_hits_total", "Total redirect cache hits")?;
        let cache_misses_total =
            Counter::new("hoplink_cache_misses_total", "Total redirect cache misses")?;

        let rate_limited_total = Counter::new(
            "hoplink_rate_limited_total",
            "Total requests rejected by the rate-limit pre-filter",
        )?;

        let auth_failures_total = Counter::new(
            "hoplink_auth_failures_total",
            "Total admin authentication failures",
        )?;

        let build_info = prometheus::GaugeVec::new(
            Opts::new(
                "hoplink_build_info",
                "Build information about the running binary",
            ),
            &["version"],
        )?;

        let uptime_seconds =
            Gauge::new("hoplink_uptime_seconds", "Server uptime in seconds")?;

        // Register all metrics
        macro_rules! register {
            ($registry:expr, $metric:ident) => {
                $registry.register(Box::new($metric.clone()))?;
            };
        }
        register!(registry, http_request_duration_seconds);
        register!(registry, http_requests_total);
        register!(registry, redirects_total);
        register!(registry, events_published_total);
        register!(registry, events_dropped_total);
        register!(registry, consumer_applied_total);
        register!(registry, consumer_dead_letter_total);
        register!(registry, consumer_flush_size);
        register!(registry, cache_hits_total);
        register!(registry, cache_misses_total);
        register!(registry, rate_limited_total);
        register!(registry, auth_failures_total);
        register!(registry, build_info);
        register!(registry, uptime_seconds);

        // Initialize build info (value 1.0 is Prometheus convention for info metrics)
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1.0);

        Ok(Self {
            registry,
            started_at: std::time::Instant::now(),
            http_request_duration_seconds,
            http_requests_total,
            redirects_total,
            events_published_total,
            events_dropped_total,
            consumer_applied_total,
            consumer_dead_letter_total,
            consumer_flush_size,
            cache_hits_total,
            cache_misses_total,
            rate_limited_total,
            auth_failures_total,
            build_info,
            uptime_seconds,
        })
    }

    // ===== Recording helpers =====

    pub fn observe_http_request(&self, method: &str, endpoint: &str, status: &str, secs: f64) {
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint, status])
            .observe(secs);
        self.http_requests_total
            .with_label_values(&[method, endpoint, status])
            .inc();
    }

    pub fn inc_redirect(&self, outcome: &str) {
        self.redirects_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_event_published(&self) {
        self.events_published_total.inc();
    }

    pub fn inc_event_dropped(&self, reason: &str) {
        self.events_dropped_total.with_label_values(&[reason]).inc();
    }

    pub fn inc_consumer_applied(&self) {
        self.consumer_applied_total.inc();
    }

    pub fn inc_consumer_dead_letter(&self, reason: &str) {
        self.consumer_dead_letter_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn observe_consumer_flush(&self, size: f64) {
        self.consumer_flush_size.observe(size);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits_total.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses_total.inc();
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited_total.inc();
    }

    pub fn inc_auth_failure(&self) {
        self.auth_failures_total.inc();
    }

    pub fn set_uptime(&self, secs: f64) {
        self.uptime_seconds.set(secs);
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, String> {
        self.set_uptime(self.started_at.elapsed().as_secs_f64());

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| format!("Metrics output is not valid UTF-8: {}", e))
    }

    /// JSON mirror of the Prometheus exposition
    pub fn export_json(&self) -> serde_json::Value {
        let families = self.registry.gather();
        let mut out = serde_json::Map::new();

        for family in families {
            let mut samples = Vec::new();
            for metric in family.get_metric() {
                let labels: serde_json::Map<String, serde_json::Value> = metric
                    .get_label()
                    .iter()
                    .map(|l| {
                        (
                            l.get_name().to_string(),
                            serde_json::Value::String(l.get_value().to_string()),
                        )
                    })
                    .collect();

                let value = match family.get_field_type() {
                    MetricType::COUNTER => metric.get_counter().get_value(),
                    MetricType::GAUGE => metric.get_gauge().get_value(),
                    MetricType::HISTOGRAM => metric.get_histogram().get_sample_sum(),
                    _ => 0.0,
                };

                samples.push(serde_json::json!({
                    "labels": labels,
                    "value": value,
                }));
            }
            out.insert(
                family.get_name().to_string(),
                serde_json::Value::Array(samples),
            );
        }

        serde_json::Value::Object(out)
    }
}
