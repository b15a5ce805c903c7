//! Invocation configuration, read from the environment.

use std::path::PathBuf;

use crate::logging::{DEFAULT_LOGGER_NAME, Severity};
use crate::ports::{AdapterSearchPath, SchemaPaths};

/// Any case-insensitive spelling of `"true"` bypasses the message adapter.
pub const ADAPTER_DISABLED_ENV: &str = "ADAPTER_DISABLED";
/// Directory searched for the message adapter before the bundled archive.
pub const ADAPTER_DIR_ENV: &str = "ADAPTER_DIR";
/// Names deployed steps already set; read when the short names are absent.
pub const LEGACY_ADAPTER_DISABLED_ENV: &str = "CUMULUS_MESSAGE_ADAPTER_DISABLED";
pub const LEGACY_ADAPTER_DIR_ENV: &str = "CUMULUS_MESSAGE_ADAPTER_DIR";
pub const LOGGER_NAME_ENV: &str = "LOGGER_NAME";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    pub adapter_disabled: bool,

    /// Highest-precedence adapter location.
    pub adapter_dir: Option<PathBuf>,

    /// Where the bundled adapter archive is looked up.
    pub task_root: PathBuf,

    pub schemas: SchemaPaths,

    pub logger_name: String,

    /// Threshold and default severity of the step logger.
    pub log_level: Severity,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            adapter_disabled: false,
            adapter_dir: None,
            task_root: PathBuf::from("."),
            schemas: SchemaPaths::default(),
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            log_level: Severity::default(),
        }
    }
}

impl InvokerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map here so the
    /// process environment is never touched).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let adapter_disabled = lookup(ADAPTER_DISABLED_ENV)
            .or_else(|| lookup(LEGACY_ADAPTER_DISABLED_ENV))
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        let adapter_dir = lookup(ADAPTER_DIR_ENV)
            .filter(|v| !v.is_empty())
            .or_else(|| lookup(LEGACY_ADAPTER_DIR_ENV).filter(|v| !v.is_empty()))
            .map(PathBuf::from);

        let logger_name = lookup(LOGGER_NAME_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.logger_name);

        let log_level = match lookup(LOG_LEVEL_ENV).map(|v| v.parse::<Severity>()) {
            Some(Ok(severity)) => severity,
            Some(Err(err)) => {
                tracing::warn!(%err, "ignoring {LOG_LEVEL_ENV}");
                defaults.log_level
            }
            None => defaults.log_level,
        };

        Self {
            adapter_disabled,
            adapter_dir,
            logger_name,
            log_level,
            ..Self::default()
        }
    }

    pub fn with_schemas(mut self, schemas: SchemaPaths) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn with_task_root(mut self, task_root: impl Into<PathBuf>) -> Self {
        self.task_root = task_root.into();
        self
    }

    /// Ordered adapter locations: `adapter_dir` first, bundled archive last.
    pub fn search_path(&self) -> AdapterSearchPath {
        AdapterSearchPath::standard(&self.task_root, self.adapter_dir.as_deref())
    }
}
