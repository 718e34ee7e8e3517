//! Logger configuration, built once at start-up and handed to `init_logger`.
//!
//! The level is derived from the deployment environment: development builds log
//! everything down to debug, anything else only warnings and errors. `RUST_LOG`
//! is parsed on top so operators can still override individual modules.

use std::env;
use std::time::Duration;

use clap::ValueEnum;
use log::{LevelFilter, debug, warn};
use strum_macros::{Display, EnumString};

/// Environment variable holding the deployment environment name.
pub const ENV_VAR: &str = "PULSE_ENV";

/// Deployment environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display, EnumString)]
#[clap(rename_all = "lower")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    /// Local development: verbose logging.
    Development,
    /// Anything deployed.
    #[default]
    Production,
}

/// Process-wide logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Environment the level was derived from.
    pub environment: Environment,
    /// Maximum level emitted.
    pub level: LevelFilter,
}

impl LogConfig {
    /// Configuration for an explicit environment.
    pub fn for_environment(environment: Environment) -> Self {
        let level = match environment {
            Environment::Development => LevelFilter::Debug,
            Environment::Production => LevelFilter::Warn,
        };
        Self { environment, level }
    }

    /// Read the environment from `PULSE_ENV`; unset or unknown values mean production.
    pub fn from_env() -> Self {
        let environment = env::var(ENV_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<Environment>().ok())
            .unwrap_or_default();
        Self::for_environment(environment)
    }

    /// Override the level, keeping the environment.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Install the global logger. A second call is a no-op.
pub fn init_logger(config: &LogConfig) {
    let result = env_logger::Builder::new()
        .filter_level(config.level)
        .parse_default_env()
        .try_init();
    if result.is_ok() {
        debug!("Logger initialized for {} at {}", config.environment, config.level);
    }
}

/// Record the outcome of a call to a quote provider.
///
/// Successes go to debug, failures to warn, both with the elapsed time.
pub fn log_api_call(service: &str, endpoint: &str, success: bool, elapsed: Duration) {
    let millis = elapsed.as_millis();
    if success {
        debug!("API call to {}/{} succeeded in {}ms", service, endpoint, millis);
    } else {
        warn!("API call to {}/{} failed after {}ms", service, endpoint, millis);
    }
}
