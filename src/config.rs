use std::error::Error;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use time::macros::format_description;
use time::UtcOffset;

use crate::alert::Channel;
use crate::planner::{PlannerSettings, DEFAULT_GRACE_MINUTES, DEFAULT_WINDOW_MINUTES};
use crate::ticker::{TickerSettings, DEFAULT_BACKFILL_MINUTES};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TICK_SECS: u64 = 10;
pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read config: {}", err),
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub schedule: ScheduleConfig,
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub session_cookie: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_cookie: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub tick_secs: u64,
    pub poll_secs: u64,
    pub default_window_minutes: i64,
    pub grace_minutes: i64,
    pub backfill_minutes: i64,
    /// Offset applied to backend date-times that carry none, e.g. "-06:00".
    pub utc_offset: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            poll_secs: DEFAULT_POLL_SECS,
            default_window_minutes: DEFAULT_WINDOW_MINUTES,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            backfill_minutes: DEFAULT_BACKFILL_MINUTES,
            utc_offset: "+00:00".to_string(),
        }
    }
}

impl Config {
    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let schedule = &self.schedule;
        if schedule.tick_secs == 0 {
            return Err(ConfigError::Invalid("schedule.tick_secs must be positive".into()));
        }
        if schedule.poll_secs == 0 {
            return Err(ConfigError::Invalid("schedule.poll_secs must be positive".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        for (name, value) in [
            ("default_window_minutes", schedule.default_window_minutes),
            ("grace_minutes", schedule.grace_minutes),
            ("backfill_minutes", schedule.backfill_minutes),
        ] {
            if value < 0 {
                return Err(ConfigError::Invalid(format!(
                    "schedule.{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<UtcOffset, ConfigError> {
        parse_offset(&self.schedule.utc_offset)
    }

    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            default_window: time::Duration::minutes(self.schedule.default_window_minutes),
            grace: time::Duration::minutes(self.schedule.grace_minutes),
        }
    }

    pub fn ticker_settings(&self) -> TickerSettings {
        TickerSettings {
            planner: self.planner_settings(),
            backfill: time::Duration::minutes(self.schedule.backfill_minutes),
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.schedule.tick_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.schedule.poll_secs)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.timeout_secs)
    }
}

fn parse_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| {
        ConfigError::Invalid(format!(
            "schedule.utc_offset '{}' is not of the form +HH:MM",
            raw
        ))
    })
}
