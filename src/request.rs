use serde::Deserialize;

/// Inbound relay payload, read from the CGI request body.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    /// Tweet URL or bare status ID.
    #[serde(rename = "tweet_url")]
    pub tweet_reference: String,
    /// Twitter user the tweet came from. Selects the rule set.
    pub user: String,
    /// Slack incoming webhooks, posted to in this order.
    pub webhook_urls: Vec<String>,
}

// Webhook URLs carry their own credentials, so only their count is printed.
impl std::fmt::Debug for AlertRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRequest")
            .field("tweet_reference", &self.tweet_reference)
            .field("user", &self.user)
            .field("webhook_urls", &self.webhook_urls.len())
            .finish()
    }
}

impl AlertRequest {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
