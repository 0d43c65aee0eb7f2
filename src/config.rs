use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use crate::model::{ALL_SELECTOR, Roster, Subject};

const APP_DIR: &str = "livewatch";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub config: ConfigOptions,
    #[serde(default)]
    pub streamers: Vec<Subject>,
    #[serde(default)]
    pub watches: Vec<DeclaredWatch>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigOptions {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub state_path: Option<PathBuf>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_live_url_base")]
    pub live_url_base: String,
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,
    pub discord_token: Option<String>,
}

/// A watch that should be active whenever the daemon runs.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredWatch {
    pub owner_user_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub subject: Option<String>,
}

fn default_check_interval_secs() -> u64 {
    180
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_api_base_url() -> String {
    "https://api.chzzk.naver.com/service/v3/".to_string()
}

fn default_live_url_base() -> String {
    "https://chzzk.naver.com/live/".to_string()
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10/".to_string()
}

impl Config {
    /// Loads from `$LIVEWATCH_CONFIG`, or the user config dir when unset.
    pub fn load() -> Result<Config> {
        let path = match dotenvy::var("LIVEWATCH_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::config_dir()
                .ok_or_else(|| Error::Config("no config directory on this platform".into()))?
                .join(APP_DIR)
                .join("config.toml"),
        };
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // if discord_token is not set use env with dotenvy
        if config.config.discord_token.is_none() {
            config.config.discord_token = dotenvy::var("DISCORD_TOKEN").ok();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.check_interval_secs == 0 {
            return Err(Error::Config("check_interval_secs must be positive".into()));
        }

        let mut keys = HashSet::new();
        let mut ids = HashSet::new();
        for subject in &self.streamers {
            if subject.key.is_empty() || subject.id.is_empty() {
                return Err(Error::Config(format!(
                    "streamer {:?} needs a non-empty key and id",
                    subject.name
                )));
            }
            if subject.id == ALL_SELECTOR {
                return Err(Error::Config(format!(
                    "streamer {:?} cannot use the reserved id {ALL_SELECTOR}",
                    subject.name
                )));
            }
            if !keys.insert(subject.key.as_str()) {
                return Err(Error::Config(format!("duplicate streamer key {}", subject.key)));
            }
            if !ids.insert(subject.id.as_str()) {
                return Err(Error::Config(format!("duplicate streamer id {}", subject.id)));
            }
        }
        Ok(())
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.streamers.clone())
    }

    /// Explicit `state_path`, or `<data dir>/livewatch/state.json`.
    pub fn state_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.state_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("state.json"))
            .ok_or_else(|| Error::Config("no data directory on this platform".into()))
    }

    pub fn discord_token(&self) -> Result<&str> {
        self.config
            .discord_token
            .as_deref()
            .ok_or_else(|| Error::Config("discord_token is not set (config or DISCORD_TOKEN)".into()))
    }
}
