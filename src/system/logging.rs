//! tracing 初始化
//!
//! 级别过滤走 EnvFilter，格式支持 text / json，可选滚动文件输出。
//! 文件目标打不开时退回 stdout，进程不因日志配置问题而起不来。

use std::io::Write;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use crate::config::LoggingConfig;

/// 初始化全局 subscriber
///
/// 返回的 guard 负责冲刷 non-blocking writer，必须存活到进程结束。
/// 只能调用一次，且要在任何组件产生日志之前。
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let (writer, ansi): (Box<dyn Write + Send>, bool) = match file_writer(config) {
        Ok(Some(writer)) => (writer, false),
        Ok(None) => (Box::new(std::io::stdout()), true),
        Err(e) => {
            // subscriber 还没装好，只能走 stderr
            eprintln!("logging: {}, falling back to stdout", e);
            (Box::new(std::io::stdout()), true)
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.level.clone()))
        .with_writer(non_blocking)
        .with_level(true)
        .with_ansi(ansi);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    guard
}

/// 按配置构造文件 writer；未配置文件输出返回 None
fn file_writer(config: &LoggingConfig) -> Result<Option<Box<dyn Write + Send>>, String> {
    let Some(path) = config.file.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let path = Path::new(path);

    if config.enable_rotation {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(env!("CARGO_PKG_NAME"));

        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(stem)
            .filename_suffix("log")
            .max_log_files(config.max_backups.max(1) as usize)
            .build(dir.unwrap_or(Path::new(".")))
            .map_err(|e| format!("rolling appender for {}: {}", path.display(), e))?;
        Ok(Some(Box::new(appender)))
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("open {}: {}", path.display(), e))?;
        Ok(Some(Box::new(file)))
    }
}
