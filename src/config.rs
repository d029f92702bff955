use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use crate::{rules::RuleBook, slack::FormatOptions};

/// Everything a single relay invocation needs, assembled once at startup.
pub struct Config {
    pub credentials: TwitterCredentials,
    pub rules: RuleBook,
    /// Base URL of the Twitter REST API, without trailing slash.
    pub twitter_api: String,
    /// Upper bound for every outbound HTTP call.
    pub timeout: Duration,
    pub format: FormatOptions,
}

/// Where configuration comes from, as given on the command line.
pub struct Settings {
    pub twitter_config: PathBuf,
    pub regexes: PathBuf,
    pub twitter_api: String,
    pub timeout: Duration,
    pub format: FormatOptions,
}

/// OAuth 1.0a application credentials.
#[derive(Deserialize, Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

/// Patterns for one user as written in the regexes file.
#[derive(Deserialize, Default, Debug)]
pub struct RawRules {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid pattern {pattern:?} for user {user}: {source}")]
    Pattern {
        user: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("token", &self.token)
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

impl Settings {
    pub fn load(self) -> Result<Config, ConfigError> {
        Ok(Config {
            credentials: TwitterCredentials::load(&self.twitter_config)?,
            rules: RuleBook::load(&self.regexes)?,
            twitter_api: self.twitter_api,
            timeout: self.timeout,
            format: self.format,
        })
    }
}

impl TwitterCredentials {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_yaml(path)
    }
}

impl RuleBook {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: HashMap<String, RawRules> = read_yaml(path)?;
        Ok(Self::compile(raw))
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConfigError::Open {
            path: path.to_owned(),
            source,
        })?;

    serde_yaml::from_reader(file).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}
