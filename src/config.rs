//! Configuration loading
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `stagehand.toml` in the working directory (optional), or an explicit
//!    file from `config_path` / `STAGEHAND_CONFIG_PATH` (required)
//! 3. Environment variables `STAGEHAND__SECTION__KEY` (`.env` is loaded first)
//! 4. Builder overrides (CLI flags)

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::interpreter::Limits;

pub const DEFAULT_STEPS_PER_TICK: usize = 1000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = crate::interpreter::executor::DEFAULT_MAX_CALL_DEPTH;
pub const DEFAULT_LOG_FILTER: &str = "info";

const DEFAULT_CONFIG_FILE: &str = "stagehand.toml";
const CONFIG_PATH_VAR: &str = "STAGEHAND_CONFIG_PATH";
const ENV_PREFIX: &str = "STAGEHAND";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub interpreter: InterpreterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterpreterConfig {
    /// Steps each process runs before yielding to the others
    pub steps_per_tick: usize,
    pub max_call_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset
    pub filter: String,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_call_depth: self.interpreter.max_call_depth,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter.steps_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "interpreter.steps_per_tick must be at least 1".to_string(),
            ));
        }
        if self.interpreter.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "interpreter.max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    steps_per_tick: Option<usize>,
    max_call_depth: Option<usize>,
    log_filter: Option<String>,
    skip_environment: bool,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn steps_per_tick(mut self, steps: Option<usize>) -> Self {
        self.steps_per_tick = steps;
        self
    }

    pub fn max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    /// Ignore `.env`, `STAGEHAND_*` variables and the default config file
    pub fn isolated(mut self) -> Self {
        self.skip_environment = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_environment {
            // A missing .env is normal
            let _ = dotenvy::dotenv();
        }

        let mut builder = config::Config::builder()
            .set_default("interpreter.steps_per_tick", DEFAULT_STEPS_PER_TICK as i64)?
            .set_default("interpreter.max_call_depth", DEFAULT_MAX_CALL_DEPTH as i64)?
            .set_default("logging.filter", DEFAULT_LOG_FILTER)?;

        let explicit = self.config_path.clone().or_else(|| {
            if self.skip_environment {
                None
            } else {
                std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from)
            }
        });
        match explicit {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.as_path()).required(true));
            }
            None if !self.skip_environment => {
                builder = builder.add_source(
                    config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Toml)
                        .required(false),
                );
            }
            None => {}
        }

        if !self.skip_environment {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(steps) = self.steps_per_tick {
            builder = builder.set_override("interpreter.steps_per_tick", steps as i64)?;
        }
        if let Some(depth) = self.max_call_depth {
            builder = builder.set_override("interpreter.max_call_depth", depth as i64)?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::builder().isolated().build().unwrap();

        assert_eq!(config.interpreter.steps_per_tick, 1000);
        assert_eq!(config.interpreter.max_call_depth, 256);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.limits(), Limits::default());
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[interpreter]\nsteps_per_tick = 50\nmax_call_depth = 12\n\n[logging]\nfilter = \"debug\""
        )
        .unwrap();

        let config = Config::builder()
            .isolated()
            .config_path(Some(file.path().to_path_buf()))
            .steps_per_tick(Some(7))
            .build()
            .unwrap();

        assert_eq!(config.interpreter.steps_per_tick, 7);
        assert_eq!(config.interpreter.max_call_depth, 12);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::builder()
            .isolated()
            .config_path(Some(dir.path().join("absent.toml")))
            .build();

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let result = Config::builder()
            .isolated()
            .steps_per_tick(Some(0))
            .build();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
