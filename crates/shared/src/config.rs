use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_i32_env, parse_u64_env, require_env};
use crate::timestamp::{DEFAULT_UTC_OFFSET_HOURS, reference_offset};

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_DATA_FILE: &str = "vkids.json";

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub poll_timeout_seconds: u64,
    pub retry_base_seconds: u64,
    pub retry_max_seconds: u64,
    pub data_file: PathBuf,
    pub utc_offset: FixedOffset,
    pub reminder_unit: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let utc_offset_hours = parse_i32_env("VKID_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS)?;
        let utc_offset = reference_offset(utc_offset_hours).ok_or_else(|| {
            ConfigError::InvalidConfiguration(format!(
                "VKID_UTC_OFFSET_HOURS must be between -23 and 23, got {utc_offset_hours}"
            ))
        })?;

        let reminder_unit_seconds = parse_u64_env("VKID_REMINDER_UNIT_SECONDS", 3600)?;
        if reminder_unit_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "VKID_REMINDER_UNIT_SECONDS must be greater than 0".to_string(),
            ));
        }

        let retry_base_seconds = parse_u64_env("TELEGRAM_RETRY_BASE_SECONDS", 2)?;
        let retry_max_seconds = parse_u64_env("TELEGRAM_RETRY_MAX_SECONDS", 60)?;
        if retry_base_seconds > retry_max_seconds {
            return Err(ConfigError::InvalidConfiguration(
                "TELEGRAM_RETRY_BASE_SECONDS must not exceed TELEGRAM_RETRY_MAX_SECONDS"
                    .to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token: require_env("TELEGRAM_BOT_TOKEN")?,
            telegram_api_url: optional_trimmed_env("TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            poll_timeout_seconds: parse_u64_env("TELEGRAM_POLL_TIMEOUT_SECONDS", 60)?,
            retry_base_seconds,
            retry_max_seconds,
            data_file: optional_trimmed_env("VKID_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            utc_offset,
            reminder_unit: Duration::from_secs(reminder_unit_seconds),
        })
    }
}
