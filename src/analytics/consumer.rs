//! 分析消费端
//!
//! 消费组成员：认领事件总线分区，按批拉取 HitEvent 并应用计数。
//! 单批 ≤ batch_size，全局最多 concurrency 个 flush 同时在途；批内
//! 每条事件独立 settle，坏事件进死信，不拖垮整批。偏移量只在一条
//! 事件处理完成后前移（失败事件经有界重试后死信，同样视为处理完成），
//! 投递语义是 at-least-once：计数可能因重试高估，唯一访客集合靠
//! 幂等插入自我纠正。
//!
//! 实例状态机：
//! ```text
//! [Idle] → start → [Subscribing] → assigned → [Running]
//! [Running] → pause → [Paused] → resume → [Running]
//! [Running] → shutdown → [Draining] → drained → [Stopped]
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::AnalyticsConfig;
use crate::errors::{HoplinkError, Result};
use crate::events::{HitEvent, HitEventBus, PartitionReceiver, PartitionedBus};

use super::AnalyticsStore;

/// 事件时间戳容忍窗口：过去 24 小时到未来 5 分钟
const TOLERANCE_PAST_HOURS: i64 = 24;
const TOLERANCE_FUTURE_MINS: i64 = 5;

/// 单条事件应用失败的重试次数（之后进死信）
const APPLY_RETRIES: u32 = 3;

/// 消费端实例状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Subscribing,
    Running,
    Paused,
    Draining,
    Stopped,
}

impl ConsumerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Subscribing,
            2 => Self::Running,
            3 => Self::Paused,
            4 => Self::Draining,
            5 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Subscribing => 1,
            Self::Running => 2,
            Self::Paused => 3,
            Self::Draining => 4,
            Self::Stopped => 5,
        }
    }
}

/// 死信出口
///
/// 核心只定义契约；默认实现打日志，生产部署可以接外部队列。
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn deliver(&self, event: HitEvent, reason: &str);
}

pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn deliver(&self, event: HitEvent, reason: &str) {
        warn!(
            "Dead letter: code={} ts={} reason={}",
            event.code, event.timestamp, reason
        );
        if let Some(metrics) = crate::metrics::get_metrics() {
            metrics.inc_consumer_dead_letter(reason);
        }
    }
}

pub struct AnalyticsConsumer {
    store: Arc<AnalyticsStore>,
    dead_letter: Arc<dyn DeadLetterSink>,
    batch_size: usize,
    poll_interval: Duration,
    flush_permits: Arc<Semaphore>,
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnalyticsConsumer {
    pub fn new(
        store: Arc<AnalyticsStore>,
        dead_letter: Arc<dyn DeadLetterSink>,
        config: &AnalyticsConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            dead_letter,
            batch_size: config.consumer_batch_size.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            flush_permits: Arc::new(Semaphore::new(config.consumer_concurrency.max(1))),
            state: AtomicU8::new(ConsumerState::Idle.as_u8()),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConsumerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// 认领总线分区并启动 worker（每分区一个，保证分区内顺序）
    pub async fn start(self: &Arc<Self>, bus: &PartitionedBus) -> Result<()> {
        self.set_state(ConsumerState::Subscribing);

        let partitions = bus.claim_partitions().ok_or_else(|| {
            HoplinkError::internal("Event bus partitions already claimed by another consumer")
        })?;

        let mut workers = self.workers.lock().await;
        for partition in partitions {
            let consumer = Arc::clone(self);
            workers.push(tokio::spawn(async move {
                consumer.run_partition(partition).await;
            }));
        }

        self.set_state(ConsumerState::Running);
        info!(
            "Analytics consumer running on topic '{}' with {} partition workers",
            bus.topic(),
            workers.len()
        );
        Ok(())
    }

    /// 暂停拉取（分区再均衡窗口）
    pub fn pause(&self) {
        if self.state() == ConsumerState::Running {
            self.set_state(ConsumerState::Paused);
        }
    }

    pub fn resume(&self) {
        if self.state() == ConsumerState::Paused {
            self.set_state(ConsumerState::Running);
        }
    }

    /// 优雅停机：停止拉取，排空在途批次
    pub async fn shutdown(&self) {
        if matches!(self.state(), ConsumerState::Stopped | ConsumerState::Idle) {
            return;
        }
        self.set_state(ConsumerState::Draining);
        let _ = self.shutdown_tx.send(true);

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                error!("Consumer worker join failed: {}", e);
            }
        }

        self.set_state(ConsumerState::Stopped);
        info!("Analytics consumer stopped");
    }

    async fn run_partition(&self, mut partition: PartitionReceiver) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                // Draining: 把已缓冲的事件处理完再退出
                loop {
                    let batch = partition.poll_batch(self.batch_size);
                    if batch.is_empty() {
                        break;
                    }
                    self.flush(batch).await;
                }
                debug!("Partition {} worker drained", partition.partition);
                return;
            }

            if self.state() == ConsumerState::Paused {
                sleep(self.poll_interval).await;
                continue;
            }

            let batch = partition.poll_batch(self.batch_size);
            if batch.is_empty() {
                // 空转：等新事件或停机信号
                tokio::select! {
                    event = partition.recv() => {
                        match event {
                            Some(event) => self.flush(vec![event]).await,
                            None => {
                                debug!("Partition {} channel closed", partition.partition);
                                return;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {}
                }
                continue;
            }

            self.flush(batch).await;
        }
    }

    /// 一次 flush：批内每条事件独立 settle
    async fn flush(&self, batch: Vec<HitEvent>) {
        let _permit = self
            .flush_permits
            .acquire()
            .await
            .expect("flush semaphore closed");

        let count = batch.len();
        join_all(batch.into_iter().map(|event| self.process_event(event))).await;

        if let Some(metrics) = crate::metrics::get_metrics() {
            metrics.observe_consumer_flush(count as f64);
        }
    }

    /// 单条事件：校验 → 应用（有界重试）→ 失败进死信
    async fn process_event(&self, event: HitEvent) {
        if let Err(reason) = validate_event(&event) {
            self.dead_letter.deliver(event, reason).await;
            return;
        }

        let mut attempt = 0;
        loop {
            match self.apply_event(&event).await {
                Ok(()) => {
                    if let Some(metrics) = crate::metrics::get_metrics() {
                        metrics.inc_consumer_applied();
                    }
                    return;
                }
                Err(e) if attempt < APPLY_RETRIES => {
                    attempt += 1;
                    warn!(
                        "Apply failed for '{}' (attempt {}/{}): {}",
                        event.code, attempt, APPLY_RETRIES, e
                    );
                    sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                Err(e) => {
                    error!("Apply permanently failed for '{}': {}", event.code, e);
                    self.dead_letter.deliver(event, "apply-failed").await;
                    return;
                }
            }
        }
    }

    /// 计数批 + 访问时间 + 唯一访客，全部交换律/幂等，可重复应用
    async fn apply_event(&self, event: &HitEvent) -> Result<()> {
        self.store.apply_hit(event).await?;
        self.store
            .touch_access_times(&event.code, event.timestamp)
            .await?;
        self.store
            .record_unique_visitor(
                &event.code,
                event.timestamp.date_naive(),
                &event.ip,
                &event.user_agent,
            )
            .await?;
        Ok(())
    }
}

/// 事件校验：必填字段 + 时间戳容忍窗口
fn validate_event(event: &HitEvent) -> std::result::Result<(), &'static str> {
    if !event.has_required_fields() {
        return Err("missing-fields");
    }

    let now = Utc::now();
    if event.timestamp < now - ChronoDuration::hours(TOLERANCE_PAST_HOURS) {
        return Err("timestamp-too-old");
    }
    if event.timestamp > now + ChronoDuration::minutes(TOLERANCE_FUTURE_MINS) {
        return Err("timestamp-in-future");
    }

    Ok(())
}
