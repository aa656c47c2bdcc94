//! Configuration system for the bot.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/studiobot/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

/// Errors that can occur when loading bot configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The configured timezone is not a known IANA zone.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    /// An hour/minute pair is out of range.
    #[error("invalid time of day {hour}:{minute:02}")]
    InvalidTime {
        /// Configured hour.
        hour: u32,
        /// Configured minute.
        minute: u32,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the bot.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BotConfigFile {
    gateway: GatewayFileConfig,
    chat: ChatFileConfig,
    schedule: ScheduleFileConfig,
    connection: ConnectionFileConfig,
}

/// `[gateway]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct GatewayFileConfig {
    url: Option<String>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    client_id: Option<String>,
    channel: Option<String>,
}

/// `[schedule]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ScheduleFileConfig {
    timezone: Option<String>,
    digest_hour: Option<u32>,
    digest_minute: Option<u32>,
    warning_hour: Option<u32>,
    warning_minute: Option<u32>,
}

/// `[connection]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConnectionFileConfig {
    reconnect_delay_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the bot.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Studio task notification bot")]
pub struct CliArgs {
    /// Gateway WebSocket URL.
    #[arg(short, long, env = "GATEWAY_URL")]
    pub gateway: Option<String>,

    /// Session identity used for both the store and chat logins.
    #[arg(long, env = "BOT_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Destination chat channel for notifications. Without one, messages
    /// are logged instead of sent.
    #[arg(long, env = "BOT_CHANNEL")]
    pub channel: Option<String>,

    /// IANA timezone for the schedule (e.g. `Europe/Rome`).
    #[arg(long, env = "BOT_TZ")]
    pub timezone: Option<String>,

    /// Hour of the daily digest (0-23).
    #[arg(long, env = "BOT_DIGEST_HOUR")]
    pub digest_hour: Option<u32>,

    /// Minute of the daily digest (0-59).
    #[arg(long, env = "BOT_DIGEST_MINUTE")]
    pub digest_minute: Option<u32>,

    /// Hour of the evening deadline warning (0-23).
    #[arg(long, env = "BOT_WARNING_HOUR")]
    pub warning_hour: Option<u32>,

    /// Minute of the evening deadline warning (0-59).
    #[arg(long, env = "BOT_WARNING_MINUTE")]
    pub warning_minute: Option<u32>,

    /// Path to config file (default: `~/.config/studiobot/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "STUDIOBOT_LOG")]
    pub log_level: String,

    /// Also write logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Gateway WebSocket URL.
    pub gateway_url: String,
    /// Session identity for logins.
    pub client_id: String,
    /// Destination chat channel, if any.
    pub channel: Option<String>,
    /// Schedule timezone.
    pub timezone: Tz,
    /// Daily digest firing time.
    pub digest_hour: u32,
    pub digest_minute: u32,
    /// Deadline warning firing time.
    pub warning_hour: u32,
    pub warning_minute: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Log level filter string.
    pub log_level: String,
    /// Optional log file path.
    pub log_file: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            gateway_url: "ws://127.0.0.1:9100/ws".to_string(),
            client_id: "studiobot".to_string(),
            channel: None,
            timezone: chrono_tz::Europe::Rome,
            digest_hour: 9,
            digest_minute: 0,
            warning_hour: 18,
            warning_minute: 0,
            reconnect_delay: Duration::from_secs(5),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl BotConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or a resolved value is out of range.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `BotConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &BotConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timezone = match cli
            .timezone
            .as_deref()
            .or(file.schedule.timezone.as_deref())
        {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))?,
            None => defaults.timezone,
        };

        let digest_hour = cli
            .digest_hour
            .or(file.schedule.digest_hour)
            .unwrap_or(defaults.digest_hour);
        let digest_minute = cli
            .digest_minute
            .or(file.schedule.digest_minute)
            .unwrap_or(defaults.digest_minute);
        check_time(digest_hour, digest_minute)?;

        let warning_hour = cli
            .warning_hour
            .or(file.schedule.warning_hour)
            .unwrap_or(defaults.warning_hour);
        let warning_minute = cli
            .warning_minute
            .or(file.schedule.warning_minute)
            .unwrap_or(defaults.warning_minute);
        check_time(warning_hour, warning_minute)?;

        Ok(Self {
            gateway_url: cli
                .gateway
                .clone()
                .or_else(|| file.gateway.url.clone())
                .unwrap_or(defaults.gateway_url),
            client_id: cli
                .client_id
                .clone()
                .or_else(|| file.chat.client_id.clone())
                .unwrap_or(defaults.client_id),
            channel: cli.channel.clone().or_else(|| file.chat.channel.clone()),
            timezone,
            digest_hour,
            digest_minute,
            warning_hour,
            warning_minute,
            reconnect_delay: file
                .connection
                .reconnect_delay_secs
                .map_or(defaults.reconnect_delay, Duration::from_secs),
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        })
    }
}

fn check_time(hour: u32, minute: u32) -> Result<(), ConfigError> {
    if hour > 23 || minute > 59 {
        return Err(ConfigError::InvalidTime { hour, minute });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the bot.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<BotConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(BotConfigFile::default());
        };
        config_dir.join("studiobot").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BotConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
