use std::path::Path;

use tracing::Level;
use tracing_appender::rolling::{Builder as RollingBuilder, RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize structured logging based on configuration
///
/// The console always gets a layer (JSON or pretty). When `file_path` is set,
/// a JSON layer is added that writes to a daily-rotated file next to it.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = parse_log_level(&config.level)?;

    // Create env filter from config level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);

    if config.format.as_str() == "json" {
        layers.push(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_line_number(true)
                .with_file(false)
                .boxed(),
        );
    }

    if let Some(file_path) = &config.file_path {
        let appender = rolling_appender(Path::new(file_path), config.max_files)?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_writer(appender)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Build a daily-rotating appender from a path like `/app/logs/proxy.log`
fn rolling_appender(path: &Path, max_files: usize) -> anyhow::Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;

    let mut builder = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_files.max(1));
    if let Some(suffix) = path.extension().and_then(|s| s.to_str()) {
        builder = builder.filename_suffix(suffix);
    }

    builder
        .build(directory)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {e}", path.display()))
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
