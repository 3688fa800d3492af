use serde::{Deserialize, Serialize};

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub events: EventsConfig,
    pub analytics: AnalyticsConfig,
    pub features: FeatureConfig,
    pub rate_limit: RateLimitConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 对外绝对地址，用于拼装 short_url
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    /// 单次查询超时（秒）
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 缓存系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    #[serde(default = "default_cache_type")]
    pub cache_type: String,
    #[serde(default = "default_cache_ttl")]
    pub default_ttl: u64,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 内存缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
}

/// 事件总线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_topic_hits")]
    pub topic_hits: String,
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// 每个分区的缓冲容量
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_publish_retry_base_ms")]
    pub publish_retry_base_ms: u64,
    #[serde(default = "default_publish_retry_max_attempts")]
    pub publish_retry_max_attempts: u32,
}

/// 分析管道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// 消费端单次 flush 的最大事件数
    #[serde(default = "default_consumer_batch_size")]
    pub consumer_batch_size: usize,
    /// 允许并发的 flush 数量
    #[serde(default = "default_consumer_concurrency")]
    pub consumer_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// retention 清扫间隔（秒）
    #[serde(default = "default_retention_sweep_interval")]
    pub retention_sweep_interval: u64,
    #[serde(default = "default_minute_ttl_days")]
    pub minute_ttl_days: i64,
    #[serde(default = "default_visitor_ttl_days")]
    pub visitor_ttl_days: i64,
    /// 外部 GeoIP API，{ip} 为占位符；空字符串关闭地理富化
    #[serde(default)]
    pub geoip_api_url: String,
}

/// 功能开关与业务参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_code_length")]
    pub default_code_length: usize,
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,
    #[serde(default = "default_alias_min_length")]
    pub alias_min_length: usize,
    #[serde(default = "default_alias_max_length")]
    pub alias_max_length: usize,
    #[serde(default)]
    pub enable_url_scanning: bool,
    /// 外部信誉检查 API，{url} 为占位符
    #[serde(default)]
    pub scanner_api_url: String,
}

/// 限流配置（创建路由的前置过滤器）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 管理接口密钥；空字符串关闭管理路由
    #[serde(default)]
    pub admin_api_key: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// CORS 跨域配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

// Default value functions
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_database_url() -> String {
    "sqlite://hoplink.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    1
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_cache_type() -> String {
    "memory".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "hoplink:".to_string()
}

fn default_memory_capacity() -> u64 {
    10000
}

fn default_topic_hits() -> String {
    "url.hits".to_string()
}

fn default_partitions() -> usize {
    8
}

fn default_buffer_size() -> usize {
    4096
}

fn default_publish_retry_base_ms() -> u64 {
    300
}

fn default_publish_retry_max_attempts() -> u32 {
    8
}

fn default_consumer_batch_size() -> usize {
    100
}

fn default_consumer_concurrency() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_retention_sweep_interval() -> u64 {
    3600
}

fn default_minute_ttl_days() -> i64 {
    30
}

fn default_visitor_ttl_days() -> i64 {
    90
}

fn default_code_length() -> usize {
    7
}

fn default_max_url_length() -> usize {
    2048
}

fn default_alias_min_length() -> usize {
    3
}

fn default_alias_max_length() -> usize {
    50
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_max() -> u64 {
    30
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_cors_enabled() -> bool {
    true
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            base_url: default_base_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            default_ttl: default_cache_ttl(),
            redis: RedisConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_memory_capacity(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topic_hits: default_topic_hits(),
            partitions: default_partitions(),
            buffer_size: default_buffer_size(),
            publish_retry_base_ms: default_publish_retry_base_ms(),
            publish_retry_max_attempts: default_publish_retry_max_attempts(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            consumer_batch_size: default_consumer_batch_size(),
            consumer_concurrency: default_consumer_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            retention_sweep_interval: default_retention_sweep_interval(),
            minute_ttl_days: default_minute_ttl_days(),
            visitor_ttl_days: default_visitor_ttl_days(),
            geoip_api_url: String::new(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            default_code_length: default_code_length(),
            max_url_length: default_max_url_length(),
            alias_min_length: default_alias_min_length(),
            alias_max_length: default_alias_max_length(),
            enable_url_scanning: false,
            scanner_api_url: String::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_rate_limit_window(),
            max_requests: default_rate_limit_max(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_api_key: String::new(),
            api_key_header: default_api_key_header(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_cors_enabled(),
            allowed_origins: vec![],
            max_age: default_cors_max_age(),
        }
    }
}
