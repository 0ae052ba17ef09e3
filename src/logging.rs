//! Structured logging setup.
//!
//! JSON output for production, pretty output for development, optional file
//! output with daily rotation. Status events sent to the UI are mirrored
//! into this log by [`crate::protocol::Reporter`], so the log alone tells
//! the full story of a run.

use anyhow::Result;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files when output is `File`.
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production" || environment == "prod";

        Self {
            format: if is_production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            // stdout carries the status event stream; logs go elsewhere.
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "campaign-forge".to_string(),
            environment,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(format) = env::var("LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => config.format,
            };
        }

        if let Ok(output) = env::var("LOG_OUTPUT") {
            config.output = match output.to_lowercase().as_str() {
                "stdout" => LogOutput::Stdout,
                "stderr" => LogOutput::Stderr,
                "file" => LogOutput::File,
                _ => config.output,
            };
        }

        if let Ok(log_dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        config
    }
}

/// Initializes the global subscriber. The returned guard must live as long
/// as the process when file output is used, or buffered lines are lost.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if config.environment == "production" || config.environment == "prod" {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(format!("{default_level},hyper=info,reqwest=info"))
    });

    let (writer, guard): (Box<dyn io::Write + Send + 'static>, Option<WorkerGuard>) =
        match config.output {
            LogOutput::Stdout => (Box::new(io::stdout()), None),
            LogOutput::Stderr => (Box::new(io::stderr()), None),
            LogOutput::File => {
                let appender =
                    tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (Box::new(non_blocking), Some(guard))
            }
        };
    let writer = std::sync::Mutex::new(writer);

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(guard)
}
