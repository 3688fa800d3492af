//! 进程内分区事件总线
//!
//! N 个分区，每个分区一条有界 mpsc 通道。按 code 哈希选分区，
//! 同一 code 的事件始终落在同一分区并按发布顺序投递给唯一消费者，
//! 满足按键有序。分区满时发布端做有界退避重试，耗尽后丢弃事件并
//! 增加指标——重定向路径永远不被分析管道反压。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{trace, warn};

use super::{HitEvent, HitEventBus};
use crate::config::EventsConfig;

/// 单个分区的消费端
pub struct PartitionReceiver {
    pub partition: usize,
    receiver: mpsc::Receiver<HitEvent>,
}

impl PartitionReceiver {
    /// 取出最多 max 条事件；通道为空立即返回已取到的部分
    pub fn poll_batch(&mut self, max: usize) -> Vec<HitEvent> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.receiver.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        batch
    }

    /// 等待下一条事件（消费端空转时用）
    pub async fn recv(&mut self) -> Option<HitEvent> {
        self.receiver.recv().await
    }
}

pub struct PartitionedBus {
    topic: String,
    senders: Vec<mpsc::Sender<HitEvent>>,
    /// 消费组一次性认领全部分区
    receivers: Mutex<Option<Vec<PartitionReceiver>>>,
    retry_base_ms: u64,
    retry_max_attempts: u32,
}

impl PartitionedBus {
    pub fn new(config: &EventsConfig) -> Self {
        let partitions = config.partitions.max(1);
        let buffer = config.buffer_size.max(1);

        let mut senders = Vec::with_capacity(partitions);
        let mut receivers = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(buffer);
            senders.push(tx);
            receivers.push(PartitionReceiver {
                partition,
                receiver: rx,
            });
        }

        Self {
            topic: config.topic_hits.clone(),
            senders,
            receivers: Mutex::new(Some(receivers)),
            retry_base_ms: config.publish_retry_base_ms,
            retry_max_attempts: config.publish_retry_max_attempts,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.senders.len()
    }

    /// 消费组认领全部分区（只能认领一次）
    ///
    /// 多实例共享分区的再均衡属于外部 broker 的职责；进程内实现里
    /// 消费组只有一个成员集，按分区拆成并发 worker。
    pub fn claim_partitions(&self) -> Option<Vec<PartitionReceiver>> {
        self.receivers.lock().unwrap().take()
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }
}

#[async_trait]
impl HitEventBus for PartitionedBus {
    async fn publish(&self, event: HitEvent) {
        let partition = self.partition_for(&event.code);
        let sender = &self.senders[partition];
        let mut event = Some(event);

        // 先走快路径，满了再退避：300ms 起步 ×2，最多 8 次
        let mut delay = Duration::from_millis(self.retry_base_ms);
        for attempt in 0..=self.retry_max_attempts {
            match sender.try_send(event.take().expect("event consumed")) {
                Ok(()) => {
                    trace!("Published hit event to partition {}", partition);
                    if let Some(metrics) = crate::metrics::get_metrics() {
                        metrics.inc_event_published();
                    }
                    return;
                }
                Err(mpsc::error::TrySendError::Full(e)) => {
                    if attempt == self.retry_max_attempts {
                        warn!(
                            "Event bus partition {} saturated, dropping hit event for '{}'",
                            partition, e.code
                        );
                        if let Some(metrics) = crate::metrics::get_metrics() {
                            metrics.inc_event_dropped("saturated");
                        }
                        return;
                    }
                    event = Some(e);
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(mpsc::error::TrySendError::Closed(e)) => {
                    warn!(
                        "Event bus partition {} closed, dropping hit event for '{}'",
                        partition, e.code
                    );
                    if let Some(metrics) = crate::metrics::get_metrics() {
                        metrics.inc_event_dropped("closed");
                    }
                    return;
                }
            }
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bus_config(partitions: usize, buffer: usize) -> EventsConfig {
        EventsConfig {
            topic_hits: "url.hits".to_string(),
            partitions,
            buffer_size: buffer,
            publish_retry_base_ms: 1,
            publish_retry_max_attempts: 2,
        }
    }

    fn event(code: &str) -> HitEvent {
        HitEvent {
            code: code.to_string(),
            timestamp: Utc::now(),
            ip: "203.0.113.1".to_string(),
            user_agent: "test-agent".to_string(),
            referrer: None,
            country: None,
            city: None,
            device_type: None,
            browser: None,
            os: None,
        }
    }

    #[tokio::test]
    async fn test_same_code_same_partition_in_order() {
        let bus = PartitionedBus::new(&bus_config(4, 64));
        let mut partitions = bus.claim_partitions().expect("first claim");

        for i in 0..10 {
            let mut e = event("abc1234");
            e.referrer = Some(format!("https://ref/{}", i));
            bus.publish(e).await;
        }

        // 所有事件在同一分区且保序
        let mut seen = Vec::new();
        for p in &mut partitions {
            seen.extend(p.poll_batch(100));
        }
        assert_eq!(seen.len(), 10);
        for (i, e) in seen.iter().enumerate() {
            assert_eq!(e.code, "abc1234");
            assert_eq!(e.referrer.as_deref(), Some(format!("https://ref/{}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_claim_is_single_shot() {
        let bus = PartitionedBus::new(&bus_config(2, 8));
        assert!(bus.claim_partitions().is_some());
        assert!(bus.claim_partitions().is_none());
    }

    #[tokio::test]
    async fn test_saturated_partition_drops_after_retries() {
        let bus = PartitionedBus::new(&bus_config(1, 2));
        // 无消费者，填满缓冲
        bus.publish(event("aaa1111")).await;
        bus.publish(event("aaa1111")).await;
        // 第三条重试耗尽后被丢弃，publish 返回而不是挂起
        bus.publish(event("aaa1111")).await;

        let mut partitions = bus.claim_partitions().unwrap();
        assert_eq!(partitions[0].poll_batch(10).len(), 2);
    }
}
