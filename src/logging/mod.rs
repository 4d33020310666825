//! Structured logging configuration for the helper

use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: LogLevel,
    /// Log format (json, pretty, compact)
    pub format: LogFormat,
    /// Output destination (stdout, file, both)
    pub output: LogOutput,
    /// File path for file output
    pub file_path: Option<String>,
    /// Include source file and line numbers
    pub include_source: bool,
    /// Include thread names
    pub include_thread_names: bool,
    /// Trace-level output for the reaction path
    pub performance_tracing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// Single-line format
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(format!("Invalid log output: {}", s)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
            file_path: None,
            include_source: false,
            include_thread_names: true,
            performance_tracing: false,
        }
    }
}

impl LogConfig {
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_source: true,
            performance_tracing: true,
            ..Self::default()
        }
    }

    pub fn production() -> Self {
        let file_path = dirs::home_dir()
            .map(|home| home.join("Library/Logs/MouseFix/helper.log"))
            .map(|path| path.to_string_lossy().into_owned());

        Self {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            output: LogOutput::File,
            file_path,
            include_source: false,
            include_thread_names: false,
            performance_tracing: false,
        }
    }

    /// Load configuration from `MOUSEFIX_LOG_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("MOUSEFIX_LOG_LEVEL") {
            if let Ok(parsed_level) = LogLevel::from_str(&level) {
                config.level = parsed_level;
            }
        }

        if let Ok(format) = std::env::var("MOUSEFIX_LOG_FORMAT") {
            if let Ok(parsed_format) = LogFormat::from_str(&format) {
                config.format = parsed_format;
            }
        }

        if let Ok(output) = std::env::var("MOUSEFIX_LOG_OUTPUT") {
            if let Ok(parsed_output) = LogOutput::from_str(&output) {
                config.output = parsed_output;
            }
        }

        if let Ok(file_path) = std::env::var("MOUSEFIX_LOG_FILE") {
            config.file_path = Some(file_path);
        }

        if let Ok(include_source) = std::env::var("MOUSEFIX_LOG_SOURCE") {
            config.include_source = include_source.to_lowercase() == "true";
        }

        if let Ok(performance) = std::env::var("MOUSEFIX_LOG_PERFORMANCE") {
            config.performance_tracing = performance.to_lowercase() == "true";
        }

        config
    }
}

/// Initialize the global tracing subscriber with the given configuration
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = create_filter(config)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if matches!(config.output, LogOutput::Stdout | LogOutput::Both) {
        layers.push(create_layer(config, None)?);
    }
    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        let file_path = config
            .file_path
            .as_deref()
            .ok_or("File path required for file output")?;
        layers.push(create_layer(config, Some(file_path))?);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()?;

    info!("Logging initialized with config: {:?}", config);
    Ok(())
}

fn create_filter(config: &LogConfig) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let mut filter_str = format!("mousefix_helper={}", config.level.as_str());

    if config.performance_tracing {
        filter_str.push_str(",mousefix_helper::monitor=trace");
    }

    // RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    Ok(filter)
}

fn create_layer(config: &LogConfig, file_path: Option<&str>) -> Result<BoxedLayer, Box<dyn std::error::Error>> {
    let base = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    let layer: BoxedLayer = match file_path {
        None => match config.format {
            LogFormat::Pretty => Box::new(base.pretty()),
            LogFormat::Compact => Box::new(base.compact()),
            LogFormat::Json => Box::new(base.json()),
        },
        Some(path) => {
            if let Some(dir) = std::path::Path::new(path).parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let base = base.with_ansi(false).with_writer(std::sync::Mutex::new(file));
            match config.format {
                LogFormat::Pretty => Box::new(base.pretty()),
                LogFormat::Compact => Box::new(base.compact()),
                LogFormat::Json => Box::new(base.json()),
            }
        }
    };

    Ok(layer)
}

/// Times a block and logs the duration
#[macro_export]
macro_rules! trace_performance {
    ($name:expr, $block:block) => {{
        let span = tracing::trace_span!("performance", operation = $name);
        let _enter = span.enter();
        let start = std::time::Instant::now();

        let result = $block;

        tracing::trace!(
            operation = $name,
            duration_us = start.elapsed().as_micros() as u64,
            "Performance trace"
        );

        result
    }};
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let config = LogConfig {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            include_source: true,
            include_thread_names: false,
            performance_tracing: true,
        };

        if let Err(e) = init_logging(&config) {
            eprintln!("Failed to initialize test logging: {}", e);
        }
    });
}
