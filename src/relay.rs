use thiserror::Error;
use tracing::info;

use crate::{
    config::{Config, ConfigError},
    request::AlertRequest,
    rules::RuleBook,
    slack::{DispatchResult, FormatOptions, SlackClient, SlackMessage},
    sources::twitter::{TwitterClient, TwitterError},
};

/// One relay invocation: fetch, validate, format, dispatch.
pub struct Relay {
    twitter: TwitterClient,
    slack: SlackClient,
    rules: RuleBook,
    format: FormatOptions,
}

/// What happened to a well-formed request.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The tweet passed validation and was posted to every webhook.
    Dispatched(Vec<DispatchResult>),
    /// The tweet failed validation. Nothing was sent.
    Rejected,
    /// No rules exist for this user. Nothing was sent.
    UnknownUser(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed request: {0}")]
    MalformedInput(#[from] serde_json::Error),
    #[error("failed to fetch tweet: {0}")]
    UpstreamFetch(#[from] TwitterError),
    #[error("rules for {user} are unusable: {reason}")]
    BrokenRules { user: String, reason: String },
}

impl Relay {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let Config {
            credentials,
            rules,
            twitter_api,
            timeout,
            format,
        } = config;

        Ok(Self {
            twitter: TwitterClient::new(credentials, twitter_api, timeout)?,
            slack: SlackClient::new(timeout)?,
            rules,
            format,
        })
    }

    pub async fn handle(&self, body: &str) -> Result<Outcome, RelayError> {
        let request = AlertRequest::parse(body)?;
        info!(?request, "received alert request");

        let tweet = self.twitter.show_status(&request.tweet_reference).await?;

        let rules = match self.rules.get(&request.user) {
            Some(Ok(rules)) => rules,
            Some(Err(e)) => {
                return Err(RelayError::BrokenRules {
                    user: request.user,
                    reason: e.to_string(),
                })
            }
            None => {
                info!(user = %request.user, "no rules for user, not alerting");
                return Ok(Outcome::UnknownUser(request.user));
            }
        };

        if !rules.validate(&tweet.full_text) {
            info!(user = %request.user, "tweet did not pass validation, not alerting");
            return Ok(Outcome::Rejected);
        }

        let message = SlackMessage::from_tweet(&tweet, &request, &self.format);
        let results = self.slack.dispatch(&message, &request.webhook_urls).await;

        Ok(Outcome::Dispatched(results))
    }
}
