//! Structured logging for the bridge
//!
//! Every native call, handle creation and finalization is traced; aborted
//! operations log at error level. `RUST_LOG` overrides the configured level.

use once_cell::sync::OnceCell;
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

static SUBSCRIBER: OnceCell<()> = OnceCell::new();

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stderr,
    /// Appended to a single, never-rotated file
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Emit span enter/close events
    pub spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Stderr,
            format: LogFormat::Text,
            spans: false,
        }
    }
}

impl LogConfig {
    /// `DYNBRIDGE_LOG_LEVEL`, `DYNBRIDGE_LOG_FILE`, `DYNBRIDGE_LOG_JSON`,
    /// `DYNBRIDGE_LOG_SPANS`
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            level: var("DYNBRIDGE_LOG_LEVEL")
                .and_then(|level| level.parse().ok())
                .unwrap_or(Level::INFO),
            output: var("DYNBRIDGE_LOG_FILE")
                .map_or(LogOutput::Stderr, |path| LogOutput::File(path.into())),
            format: if var("DYNBRIDGE_LOG_JSON").is_some() {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            spans: var("DYNBRIDGE_LOG_SPANS").is_some(),
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Every handle and native call traced
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            spans: true,
            ..Self::default()
        }
    }
}

/// Install the subscriber configured from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Install the subscriber; only the first call in a process has an effect
pub fn init_with_config(config: LogConfig) {
    SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("dynbridge={}", config.level.as_str().to_lowercase()))
        });
        let spans = if config.spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = match (&config.output, config.format) {
            (LogOutput::File(path), LogFormat::Json) => fmt::layer()
                .json()
                .with_writer(file_appender(path))
                .with_span_events(spans)
                .boxed(),
            (LogOutput::File(path), LogFormat::Text) => fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender(path))
                .with_span_events(spans)
                .boxed(),
            (LogOutput::Stderr, LogFormat::Json) => fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(spans)
                .boxed(),
            (LogOutput::Stderr, LogFormat::Text) => fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(spans)
                .with_line_number(cfg!(debug_assertions))
                .boxed(),
        };

        // The embedder may already own the global subscriber
        let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
    });
}

fn file_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map_or_else(|| "dynbridge.log".into(), |name| name.to_owned());
    tracing_appender::rolling::never(directory, file_name)
}

pub fn is_initialized() -> bool {
    SUBSCRIBER.get().is_some()
}

#[inline]
pub fn log_native_call(symbol: &str, arg_count: usize) {
    tracing::trace!(event = "native_call", function = symbol, args = arg_count, "calling native function");
}

#[inline]
pub fn log_native_return(symbol: &str, results: usize) {
    tracing::trace!(event = "native_return", function = symbol, results = results, "native function returned");
}

/// A native error surfaced through the failure result
pub fn log_native_error(symbol: &str, message: &str, code: i32) {
    tracing::debug!(event = "native_error", function = symbol, code = code, error = message, "native function failed");
}

pub fn log_abort(operation: &str, error: &dyn std::error::Error) {
    tracing::error!(event = "abort", operation = operation, error = %error, "bridge operation aborted");
}

#[inline]
pub fn log_handle_created(type_name: &str, address: *const u8, owned: bool) {
    tracing::trace!(event = "handle_created", compound = type_name, address = ?address, owned = owned);
}

#[inline]
pub fn log_handle_finalized(type_name: &str, address: *const u8, owned: bool) {
    tracing::trace!(event = "handle_finalized", compound = type_name, address = ?address, owned = owned);
}
