use anyhow::Result;
use std::io;
use std::io::IsTerminal;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Filter for the given verbosity. `RUST_LOG` wins unless `--quiet` is set.
///
/// 0 = info, 1 = debug with hyper's connection chatter suppressed, 2+ = trace.
fn build_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    let default = match verbose_level {
        0 => "info",
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn,reqwest::connect=warn",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON lines when stdout is not a terminal (containers, pipes) or when forced
fn wants_json() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

/// Interactive commands log to stderr so stdout stays clean for `--output json`
pub fn init_logging(verbose_level: u8, quiet: bool) -> Result<()> {
    let registry = Registry::default().with(build_filter(verbose_level, quiet));

    if wants_json() {
        let layer = fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}

/// The refresh daemon writes to a daily-rotated file next to stderr output.
///
/// Files are named after the log file's stem: `reelview.2026-01-17` and so
/// on. The returned guard must live as long as the process logs.
pub fn init_daemon_logging(verbose_level: u8, quiet: bool, log_file: &Path) -> Result<WorkerGuard> {
    let log_dir = log_file
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;

    let prefix = log_file
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename: {}", log_file.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let json = wants_json();
    let file_layer = fmt::layer()
        .json()
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(file_writer);
    let registry = Registry::default()
        .with(build_filter(verbose_level, quiet))
        .with(file_layer);

    if json {
        let stderr_layer = fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr);
        registry.with(stderr_layer).try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr);
        registry.with(stderr_layer).try_init()?;
    }

    Ok(guard)
}
