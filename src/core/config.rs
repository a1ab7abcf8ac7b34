//! Runtime configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use crate::core::auto_layout::{LayoutConfig, LayoutMode};
use crate::core::format::{DEFAULT_IMPORTED_SCHEMA_NAME, DEFAULT_MAX_INPUT_LEN, ParseOptions};
use crate::core::sql_parser::SqlDialect;

pub const MAX_INPUT_LEN_VAR: &str = "ARCHISCHEMA_MAX_INPUT_LEN";
pub const SQL_DIALECT_VAR: &str = "ARCHISCHEMA_SQL_DIALECT";
pub const LAYOUT_MODE_VAR: &str = "ARCHISCHEMA_LAYOUT_MODE";
pub const LOG_VAR: &str = "ARCHISCHEMA_LOG";

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Largest accepted schema text, in characters
    pub max_input_len: usize,

    /// Dialect used to tokenize SQL input and to spell exported DDL
    pub sql_dialect: SqlDialect,

    pub layout_mode: LayoutMode,

    /// `EnvFilter` directive, e.g. `archischema_core=debug`
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::defaults();

        if let Some(raw) = lookup(MAX_INPUT_LEN_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(len) if len > 0 => config.max_input_len = len,
                _ => tracing::warn!(var = MAX_INPUT_LEN_VAR, value = %raw, "Ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(SQL_DIALECT_VAR) {
            match raw.parse() {
                Ok(dialect) => config.sql_dialect = dialect,
                Err(e) => tracing::warn!(var = SQL_DIALECT_VAR, error = %e, "Ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(LAYOUT_MODE_VAR) {
            match raw.parse() {
                Ok(mode) => config.layout_mode = mode,
                Err(e) => tracing::warn!(var = LAYOUT_MODE_VAR, error = %e, "Ignoring invalid value"),
            }
        }
        config.log_filter = lookup(LOG_VAR).filter(|v| !v.trim().is_empty());

        config
    }

    fn defaults() -> Self {
        Self {
            max_input_len: DEFAULT_MAX_INPUT_LEN,
            sql_dialect: SqlDialect::default(),
            layout_mode: LayoutMode::default(),
            log_filter: None,
        }
    }

    /// Check if a log filter is configured
    pub fn has_log_filter(&self) -> bool {
        self.log_filter.is_some()
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            dialect: self.sql_dialect,
            max_input_len: self.max_input_len,
            schema_name: DEFAULT_IMPORTED_SCHEMA_NAME.to_string(),
        }
    }

    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig::for_mode(self.layout_mode)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
