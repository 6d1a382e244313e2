use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Logging setup for binaries, demos and test harnesses.
///
/// Libraries in this workspace only emit `tracing` events; whoever owns
/// `main` decides how they are rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level used when `RUST_LOG` is not set
    pub level: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json_output: bool,
    /// ANSI colors (ignored for JSON)
    pub color_output: bool,
    /// Include source line numbers
    pub include_line_numbers: bool,
    /// Include thread ids, useful when chasing concurrent resolutions
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_output: false,
            color_output: true,
            include_line_numbers: cfg!(debug_assertions),
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose setup for local development
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            include_line_numbers: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// JSON output at `info`
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_output: true,
            color_output: false,
            include_line_numbers: false,
            include_thread_ids: true,
        }
    }

    /// Apply `INJECT_LOG_LEVEL` / `INJECT_LOG_JSON` on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("INJECT_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Ok(json) = std::env::var("INJECT_LOG_JSON") {
            self.json_output = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Parsed minimum level
    pub fn parsed_level(&self) -> anyhow::Result<Level> {
        Level::from_str(&self.level)
            .map_err(|_| anyhow::anyhow!("invalid log level '{}'", self.level))
    }
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = config.parsed_level()?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    if config.json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_thread_ids(config.include_thread_ids)
            .with_line_number(config.include_line_numbers);

        let subscriber = Registry::default().with(env_filter).with(json_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(config.include_thread_ids)
            .with_line_number(config.include_line_numbers)
            .with_ansi(config.color_output)
            .with_span_events(FmtSpan::CLOSE);

        let subscriber = Registry::default().with(env_filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Best-effort init for tests: writes through the test harness capture and
/// silently keeps whatever subscriber is already installed.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Measures an operation and logs its duration when finished.
pub struct OperationTimer {
    start: std::time::Instant,
    operation_name: String,
    fields: HashMap<String, Value>,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation_name: operation_name.into(),
            fields: HashMap::new(),
        }
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
    }

    /// Elapsed time so far
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;

        tracing::info!(
            operation = %self.operation_name,
            duration_ms = duration_ms,
            success = true,
            fields = ?self.fields,
            "operation completed"
        );
    }

    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: &Result<T, E>) {
        let duration_ms = self.start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => {
                tracing::info!(
                    operation = %self.operation_name,
                    duration_ms = duration_ms,
                    success = true,
                    fields = ?self.fields,
                    "operation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    operation = %self.operation_name,
                    duration_ms = duration_ms,
                    success = false,
                    error = %e,
                    fields = ?self.fields,
                    "operation failed"
                );
            }
        }
    }
}
