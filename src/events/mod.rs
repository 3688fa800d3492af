//! 命中事件总线
//!
//! 重定向路径与分析管道之间的按键有序日志。trait 是适配器接缝，
//! 进程内的分区实现见 `bus.rs`；外部 broker 实现挂在同一 trait 后面。

mod bus;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use bus::{PartitionReceiver, PartitionedBus};

/// 一次重定向观测的不可变记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitEvent {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

impl HitEvent {
    /// 必填字段齐备（code / timestamp 隐含，ip / user_agent 非空）
    pub fn has_required_fields(&self) -> bool {
        !self.code.is_empty() && !self.ip.is_empty() && !self.user_agent.is_empty()
    }
}

/// 事件总线发布端
///
/// publish 以 code 为分区键；对调用方永不阻塞重定向响应（调用方
/// 已在后台任务中），内部做有界退避，耗尽后丢弃并计数。
#[async_trait]
pub trait HitEventBus: Send + Sync {
    async fn publish(&self, event: HitEvent);

    /// 主题名（可配置，默认 url.hits）
    fn topic(&self) -> &str;
}
