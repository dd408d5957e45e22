use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, EnvFilter, Registry};

pub const DEFAULT_LOGGER_LEVEL: &str = "info";
pub const DEBUG_LOGGER_LEVEL: &str = "debug";

/// Defines the Logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Sets the logger [`EnvFilter`].
    /// Valid values: trace, debug, info, warn, error
    /// Example of a valid filter: "warn,my_crate=info,my_crate::my_mod=debug,[my_span]=trace"
    pub level: String,

    /// Determines whether the Logger should print to standard output.
    /// Valid values: true, false
    #[serde(default = "default_stdout_output")]
    pub stdout_output: bool,
}

fn default_stdout_output() -> bool {
    true
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig { level: DEFAULT_LOGGER_LEVEL.to_owned(), stdout_output: true }
    }
}

impl LoggerConfig {
    /// Returns the default configuration with the level switched to `debug` when requested.
    pub fn with_debug(debug: bool) -> Self {
        if debug {
            LoggerConfig { level: DEBUG_LOGGER_LEVEL.to_owned(), ..Default::default() }
        } else {
            Default::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("LoggerConfigurationError: [{message}]")]
    LoggerConfigurationError { message: String },
}

/// Keeps the handle needed to change the active log level.
/// The stdout layer writes synchronously, so the logger survives a `fork` when the
/// process is detached in background.
pub struct LogWorkerGuard {
    reload_handle: tracing_subscriber::reload::Handle<EnvFilter, Registry>,
}

impl LogWorkerGuard {
    pub fn reload(&self, env_filter_str: &str) -> Result<(), LoggerError> {
        let env_filter = parse_env_filter(env_filter_str)?;
        self.reload_handle.reload(env_filter).map_err(|err| LoggerError::LoggerConfigurationError {
            message: format!("Cannot reload the logger configuration. err: {:?}", err),
        })
    }
}

/// Configures the underlying logger implementation and activates it.
pub fn setup_logger(logger_config: &LoggerConfig) -> Result<LogWorkerGuard, LoggerError> {
    let env_filter = parse_env_filter(&logger_config.level)?;

    let (reloadable_env_filter, reloadable_env_filter_handle) =
        tracing_subscriber::reload::Layer::new(env_filter);

    let stdout_subscriber = if logger_config.stdout_output {
        Some(Layer::new().with_ansi(false).with_target(false).with_writer(std::io::stdout))
    } else {
        None
    };

    let subscriber =
        tracing_subscriber::registry().with(reloadable_env_filter).with(stdout_subscriber);

    set_global_logger(subscriber)?;

    Ok(LogWorkerGuard { reload_handle: reloadable_env_filter_handle })
}

fn parse_env_filter(env_filter_str: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::from_str(env_filter_str).map_err(|err| LoggerError::LoggerConfigurationError {
        message: format!("Cannot parse the logger level: [{}]. err: {:?}", env_filter_str, err),
    })
}

fn set_global_logger<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing_log::LogTracer::init().map_err(|err| LoggerError::LoggerConfigurationError {
        message: format!("Cannot start the logger LogTracer. err: {:?}", err),
    })?;
    set_global_default(subscriber).map_err(|err| LoggerError::LoggerConfigurationError {
        message: format!("Cannot start the logger. err: {:?}", err),
    })
}
