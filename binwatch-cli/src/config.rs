//! Layered configuration: compiled defaults, an optional TOML file, then
//! `BINWATCH_*` environment variables.

use std::path::{Path, PathBuf};

use binwatch_core::{model::AuditSchema, service::DEFAULT_BIN_LIMIT};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "BINWATCH_";
const SECTIONS: [&str; 4] = ["storage", "audit", "dashboard", "log"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(thiserror::Error, Debug)]
/// Reasons the configuration could not be used.
pub(crate) enum ConfigError {
    /// A provider could not be read or a value has the wrong shape.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// The explicitly requested file does not exist.
    #[error("config file {} not found", .0.display())]
    Missing(PathBuf),
    /// Values parsed but make no sense together.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Root of `binwatch.toml`.
pub(crate) struct Config {
    /// Where the database lives.
    pub(crate) storage: StorageConfig,
    /// Which audit table to write.
    pub(crate) audit: AuditConfig,
    /// Dashboard output.
    pub(crate) dashboard: DashboardConfig,
    /// Log filter.
    pub(crate) log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// `[storage]`
pub(crate) struct StorageConfig {
    /// Path of the SQLite database file.
    pub(crate) database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_dir()
            .map(|dir| dir.join("binwatch").join("binwatch.db"))
            .unwrap_or_else(|| PathBuf::from("binwatch.db"));
        Self {
            database_path: database_path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Audit table choice; `auto` probes the database once at startup.
pub(crate) enum AuditSetting {
    /// Use whichever audit table exists, preferring `bin_history`.
    #[default]
    Auto,
    /// Skip audit writes.
    None,
    /// Write `bin_history`.
    BinHistory,
    /// Write `bin_logs`.
    BinLogs,
}

impl AuditSetting {
    /// The schema named outright, or `None` for `auto`.
    #[must_use]
    pub(crate) fn fixed(self) -> Option<AuditSchema> {
        match self {
            Self::Auto => None,
            Self::None => Some(AuditSchema::None),
            Self::BinHistory => Some(AuditSchema::BinHistory),
            Self::BinLogs => Some(AuditSchema::BinLogs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// `[audit]`
pub(crate) struct AuditConfig {
    /// `auto`, `none`, `bin_history` or `bin_logs`.
    pub(crate) schema: AuditSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// `[dashboard]`
pub(crate) struct DashboardConfig {
    /// Most bins listed with the stats.
    pub(crate) bin_limit: usize,
    /// Seconds between polls in watch mode.
    pub(crate) refresh_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bin_limit: DEFAULT_BIN_LIMIT,
            refresh_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// `[log]`
pub(crate) struct LogConfig {
    /// Default level for binwatch crates; `RUST_LOG` wins when set.
    pub(crate) level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

/// Load the configuration.
///
/// With `path`, only that file is read and it must exist. Without it,
/// `<config dir>/binwatch/binwatch.toml` and then `./binwatch.toml` are merged
/// when present. Environment variables are applied last in both cases.
///
/// # Errors
///
/// Returns a [`ConfigError`] when a source cannot be read or validation fails.
pub(crate) fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    match path {
        Some(path) => {
            if !path.is_file() {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(dir) = dirs::config_dir() {
                figment = figment.merge(Toml::file(dir.join("binwatch").join("binwatch.toml")));
            }
            figment = figment.merge(Toml::file("binwatch.toml"));
        }
    }
    from_figment(figment.merge(env_provider()))
}

/// Extract and validate a configuration from an assembled figment.
///
/// # Errors
///
/// Returns a [`ConfigError`] when extraction or validation fails.
pub(crate) fn from_figment(figment: Figment) -> Result<Config, ConfigError> {
    let mut config: Config = figment.extract().map_err(Box::new)?;
    config.log.level = config.log.level.trim().to_ascii_lowercase();
    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Check values serde cannot, collecting every problem.
///
/// # Errors
///
/// Returns one message per invalid value.
pub(crate) fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push("storage.database_path must not be empty".to_owned());
    }
    if config.dashboard.bin_limit == 0 {
        errors.push("dashboard.bin_limit must be at least 1".to_owned());
    }
    if config.dashboard.refresh_secs == 0 {
        errors.push("dashboard.refresh_secs must be at least 1".to_owned());
    }
    let level = config.log.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// `BINWATCH_DASHBOARD_BIN_LIMIT` becomes `dashboard.bin_limit`.
///
/// Only the first underscore after a known section is split, so field names
/// keep theirs.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| env_key(key.as_str()).into())
}

fn env_key(raw: &str) -> String {
    let key = raw.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or(key)
}
