use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::tracker::TrackerSettings;
use crate::{
    DISCORD_API_BASE, DISCORD_GATEWAY_URL, GOAL_IMAGE_PATH, GOAL_MILESTONE, IDLE_STATUS,
    MILESTONE_LABEL, NHL_API_BASE, TRACKED_PLAYER_ID, TRACKED_PLAYER_NAME, TRACKED_TEAM,
};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable holding the Discord bot token.
pub const TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
/// Environment variable holding the announcement channel ID.
pub const CHANNEL_ENV: &str = "DISCORD_BOT_CHANNEL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Discord endpoints and the announcement image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// What to track and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_team")]
    pub team: String,
    #[serde(default = "default_player_id")]
    pub player_id: u32,
    #[serde(default = "default_player_name")]
    pub player_name: String,
    #[serde(default = "default_milestone")]
    pub milestone: i64,
    #[serde(default = "default_milestone_label")]
    pub milestone_label: String,
    /// Polling interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_idle_status")]
    pub idle_status: String,
    #[serde(default = "default_nhl_api_base")]
    pub nhl_api_base: String,
    /// Per-request timeout for the NHL API, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_image_path() -> String {
    GOAL_IMAGE_PATH.to_string()
}

fn default_gateway_url() -> String {
    DISCORD_GATEWAY_URL.to_string()
}

fn default_api_base() -> String {
    DISCORD_API_BASE.to_string()
}

fn default_team() -> String {
    TRACKED_TEAM.to_string()
}

fn default_player_id() -> u32 {
    TRACKED_PLAYER_ID
}

fn default_player_name() -> String {
    TRACKED_PLAYER_NAME.to_string()
}

fn default_milestone() -> i64 {
    GOAL_MILESTONE
}

fn default_milestone_label() -> String {
    MILESTONE_LABEL.to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_idle_status() -> String {
    IDLE_STATUS.to_string()
}

fn default_nhl_api_base() -> String {
    NHL_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            gateway_url: default_gateway_url(),
            api_base: default_api_base(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            team: default_team(),
            player_id: default_player_id(),
            player_name: default_player_name(),
            milestone: default_milestone(),
            milestone_label: default_milestone_label(),
            poll_interval_secs: default_poll_interval(),
            idle_status: default_idle_status(),
            nhl_api_base: default_nhl_api_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl TrackerConfig {
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            idle_status: self.idle_status.clone(),
            player_id: self.player_id,
            player_name: self.player_name.clone(),
            milestone: self.milestone,
            milestone_label: self.milestone_label.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load an explicitly given file, which must exist, or else
    /// [`CONFIG_PATH`] if present.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::load_or_default(Path::new(CONFIG_PATH)),
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        if config.tracker.poll_interval_secs == 0 {
            bail!("tracker.poll_interval_secs must be positive");
        }
        if config.tracker.request_timeout_secs == 0 {
            bail!("tracker.request_timeout_secs must be positive");
        }
        if config.tracker.team.trim().is_empty() {
            bail!("tracker.team must not be empty");
        }
        Ok(config)
    }
}

/// Discord credentials, read from the environment.
pub struct Secrets {
    pub token: String,
    pub channel_id: String,
}

impl Secrets {
    /// Read `DISCORD_BOT_TOKEN` and `DISCORD_BOT_CHANNEL`.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            token: required_var(TOKEN_ENV)?,
            channel_id: required_var(CHANNEL_ENV)?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    let value = dotenvy::var(name).with_context(|| format!("{name} is not set"))?;
    let value = value.trim();
    if value.is_empty() {
        bail!("{name} is empty");
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.tracker.team, "WSH");
        assert_eq!(config.tracker.player_id, 8471214);
        assert_eq!(config.tracker.poll_interval_secs, 5);
        assert_eq!(config.tracker.milestone, 894);
        assert_eq!(config.discord.image_path, "images/8471214.png");

        let settings = config.tracker.settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.idle_status, "No Caps Games :(");
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = AppConfig::parse(
            r#"
            [tracker]
            poll_interval_secs = 30
            idle_status = "Off day"

            [discord]
            image_path = "assets/goal.png"
            "#,
        )
        .unwrap();
        assert_eq!(config.tracker.poll_interval_secs, 30);
        assert_eq!(config.tracker.idle_status, "Off day");
        assert_eq!(config.tracker.team, "WSH");
        assert_eq!(config.discord.image_path, "assets/goal.png");
        assert_eq!(config.discord.api_base, "https://discord.com/api/v10");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AppConfig::parse("[tracker]\npoll_interval_secs = 0").is_err());
        assert!(AppConfig::parse("[tracker]\nteam = \" \"").is_err());
        assert!(AppConfig::parse("[tracker]\nrequest_timeout_secs = 0").is_err());
        assert!(AppConfig::parse("[tracker]\nplayer_id = \"abc\"").is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = Path::new("/nonexistent/ovi-tracker/config.toml");
        let config = AppConfig::load_or_default(path).unwrap();
        assert_eq!(config.tracker.team, "WSH");
        assert!(AppConfig::load(path).is_err());
    }

    #[test]
    fn test_explicit_config_path_must_exist() {
        let missing = Path::new("/nonexistent/ovi-tracker/custom.toml");
        let err = AppConfig::resolve(Some(missing)).unwrap_err();
        assert!(err.to_string().contains("custom.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("ovi-tracker-{}.toml", std::process::id()));
        let config = AppConfig::default();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = AppConfig::resolve(Some(path.as_path())).unwrap();
        assert_eq!(loaded.tracker.nhl_api_base, "https://api-web.nhle.com");
        assert_eq!(loaded.tracker.request_timeout(), Duration::from_secs(10));
        let _ = std::fs::remove_file(path);
    }
}
