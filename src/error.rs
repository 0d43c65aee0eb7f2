use thiserror::Error;

use crate::model::WatchKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Environment variable fetching error: {0}")]
    EnvVarNotSet(#[from] dotenvy::Error),
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Status API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Watch {0} is already active")]
    AlreadyWatching(WatchKey),
    #[error("Selector {0:?} does not match any roster subject")]
    UnknownSelector(String),
    #[error("Channel {0} is not reachable")]
    ChannelUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
