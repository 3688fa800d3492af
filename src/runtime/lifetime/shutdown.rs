//! 优雅停机
//!
//! 等停机信号，然后按与启动相反的顺序收尾：先停 HTTP 入口（由
//! server 模式的 select 负责），再排空消费端，最后撤掉后台任务。

use tracing::warn;

use super::startup::StartupContext;

/// 等待进程停机信号（SIGINT / SIGTERM）
pub async fn listen_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                warn!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        warn!("Received Ctrl-C, shutting down");
    }
}

/// 逆序停止组件；重复调用无害
pub async fn stop_components(context: &mut StartupContext) {
    // 消费端先排空（offset 推进到位）
    context.consumer.shutdown().await;

    // 后台任务直接撤
    for task in context.background_tasks.drain(..) {
        task.abort();
    }

    warn!("All components stopped");
}
