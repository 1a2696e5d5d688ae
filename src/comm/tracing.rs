use anyhow::Result;
use chrono::{Datelike, Timelike};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

struct LogTimer;

impl fmt::time::FormatTime for LogTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        let cs = now.timestamp_subsec_millis() / 10;
        write!(
            w,
            "{:04}-{:02}-{:02}:{:02}:{:02}:{:02}:{:02}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            cs
        )
    }
}

/// 初始化日志，`RUST_LOG` 优先于配置的级别
/// Installs the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    LogTracer::init().ok();
    fmt::SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_timer(LogTimer)
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}
