//! 健康检查服务
//!
//! liveness 只证明进程活着；readiness / health 探测同步依赖
//! （主存储），带超时。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, trace};

use crate::analytics::ConsumerState;
use crate::storage::SeaOrmStorage;

/// 依赖探测超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub uptime_seconds: i64,
    pub storage: HealthCheck,
    pub consumer: String,
}

pub struct HealthService {
    storage: Arc<SeaOrmStorage>,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl HealthService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self {
            storage,
            started_at: chrono::Utc::now(),
        }
    }

    /// 完整健康报告（依赖探测 + 运行时长）
    pub async fn check(&self, consumer_state: ConsumerState) -> HealthReport {
        trace!("Running health check");
        let probe_start = Instant::now();

        let storage = match tokio::time::timeout(PROBE_TIMEOUT, self.storage.count()).await {
            Ok(Ok(_)) => HealthCheck {
                status: "healthy".to_string(),
                latency_ms: Some(probe_start.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health probe failed: {}", e);
                HealthCheck {
                    status: "unhealthy".to_string(),
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                error!("Storage health probe timed out");
                HealthCheck {
                    status: "unhealthy".to_string(),
                    latency_ms: None,
                    error: Some("timeout".to_string()),
                }
            }
        };

        let now = chrono::Utc::now();
        let healthy = storage.status == "healthy";

        HealthReport {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            timestamp: now.to_rfc3339(),
            uptime_seconds: (now - self.started_at).num_seconds().max(0),
            storage,
            consumer: format!("{:?}", consumer_state),
        }
    }

    /// readiness：依赖可达即就绪
    pub async fn ready(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, self.storage.count()).await,
            Ok(Ok(_))
        )
    }
}
