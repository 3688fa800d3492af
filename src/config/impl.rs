use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use tracing::warn;

use super::AppConfig;

static CONFIG: OnceLock<ArcSwap<AppConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<AppConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from "hoplink.toml" in the current directory (if
/// present), then applies environment variable overrides. If the file is
/// missing, in-memory defaults are used.
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(AppConfig::load()));
}

/// Initialize the global configuration from an explicit value (tests)
pub fn init_config_with(config: AppConfig) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(config));
}

impl AppConfig {
    /// 从 TOML 文件 + 环境变量加载配置
    ///
    /// 未知键被忽略；解析失败回退到默认值并打日志。
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("hoplink.toml") {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse hoplink.toml: {}, using defaults", e);
                    AppConfig::default()
                }
            },
            Err(_) => AppConfig::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// 环境变量覆盖（优先级高于文件）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("SERVER_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("BASE_URL") {
            self.server.base_url = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("CACHE_TYPE") {
            self.cache.cache_type = v;
        }
        if let Ok(v) = std::env::var("REDIS_URL") {
            self.cache.redis.url = v;
        }
        if let Ok(v) = std::env::var("REDIS_TTL")
            && let Ok(ttl) = v.parse()
        {
            self.cache.default_ttl = ttl;
        }
        if let Ok(v) = std::env::var("EVENTS_TOPIC_HITS") {
            self.events.topic_hits = v;
        }
        if let Ok(v) = std::env::var("DEFAULT_CODE_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.features.default_code_length = len;
        }
        if let Ok(v) = std::env::var("MAX_URL_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.features.max_url_length = len;
        }
        if let Ok(v) = std::env::var("CUSTOM_ALIAS_MIN_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.features.alias_min_length = len;
        }
        if let Ok(v) = std::env::var("CUSTOM_ALIAS_MAX_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.features.alias_max_length = len;
        }
        if let Ok(v) = std::env::var("ENABLE_URL_SCANNING") {
            self.features.enable_url_scanning = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_TTL")
            && let Ok(secs) = v.parse()
        {
            self.rate_limit.window_secs = secs;
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_LIMIT")
            && let Ok(max) = v.parse()
        {
            self.rate_limit.max_requests = max;
        }
        if let Ok(v) = std::env::var("ADMIN_API_KEY") {
            self.api.admin_api_key = v;
        }
        if let Ok(v) = std::env::var("API_KEY_HEADER") {
            self.api.api_key_header = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.logging.level = v;
        }

        // 生成码长度必须落在 [4, 16]
        self.features.default_code_length = self.features.default_code_length.clamp(4, 16);
    }
}
