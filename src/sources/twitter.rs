use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::TwitterCredentials;

use super::oauth::{authorization_header, Nonce};

/// Format of `created_at` in v1.1 API payloads, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub struct TwitterClient {
    credentials: TwitterCredentials,
    api_base: String,
    client: Client,
}

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Scheme(#[from] serde_json::Error),
    #[error("API returned error {status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("{0:?} does not name a tweet")]
    Reference(String),
}

/// A status fetched in extended mode.
#[derive(Deserialize, Debug, Clone)]
pub struct Tweet {
    pub full_text: String,
    #[serde(deserialize_with = "twitter_time")]
    pub created_at: DateTime<Utc>,
    pub user: TwitterUser,
    #[serde(default)]
    pub entities: Entities,
}
#[derive(Deserialize, Debug, Clone)]
pub struct TwitterUser {
    pub name: String,
    /// Profile website. Often unset.
    #[serde(default)]
    pub url: Option<String>,
    pub screen_name: String,
    pub profile_image_url_https: String,
}
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Entities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    /// Absent from the payload when the tweet has no media.
    #[serde(default)]
    pub media: Vec<MediaEntity>,
}
#[derive(Deserialize, Debug, Clone)]
pub struct UrlEntity {
    pub url: String,
    pub expanded_url: String,
}
#[derive(Deserialize, Debug, Clone)]
pub struct MediaEntity {
    pub url: String,
    pub media_url_https: String,
}

#[derive(Deserialize)]
struct TwitterErrors {
    errors: Vec<TwitterErrorItem>,
}
#[derive(Deserialize)]
struct TwitterErrorItem {
    message: String,
}

impl TwitterClient {
    pub fn new(
        credentials: TwitterCredentials,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            credentials,
            api_base: api_base.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Fetches the full, untruncated tweet behind a status URL or ID.
    #[instrument(skip(self))]
    pub async fn show_status(&self, reference: &str) -> Result<Tweet, TwitterError> {
        let id = status_id(reference)
            .ok_or_else(|| TwitterError::Reference(reference.to_owned()))?;
        let url = format!("{}/statuses/show.json", self.api_base);
        let params = [("id", id), ("tweet_mode", "extended")];
        let auth =
            authorization_header(&self.credentials, "GET", &url, &params, &Nonce::generate());

        let res = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth)
            .query(&params)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TwitterErrors>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned());
            return Err(TwitterError::Server { status, message });
        }

        let tweet: Tweet = serde_json::from_str(&body)?;
        debug!(
            screen_name = %tweet.user.screen_name,
            media = tweet.entities.media.len(),
            urls = tweet.entities.urls.len(),
            "fetched tweet"
        );

        Ok(tweet)
    }
}

/// The numeric ID at the end of a status URL, or the reference itself when it
/// is already a bare ID.
pub fn status_id(reference: &str) -> Option<&str> {
    let tail = reference.trim_end_matches('/').rsplit('/').next()?;
    let id = tail.split(['?', '#']).next()?;

    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

fn twitter_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;

    DateTime::parse_from_str(&raw, CREATED_AT_FORMAT)
        .map(|t| t.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
