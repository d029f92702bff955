use std::time::Duration;

use chrono_tz::Tz;
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::{request::AlertRequest, sources::twitter::Tweet};

const HEADLINE: &str = ":beer: NEW BEER RELEASE ALERT! :beer:";
const FOOTER_ICON: &str = "https://twitter.com/favicon.ico";

/// Knobs for turning a tweet into a message.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Zone the tweet's creation time is converted to before taking its epoch.
    pub timezone: Tz,
    /// Appended to the first photo URL to request a thumbnail crop.
    pub thumb_suffix: String,
}

/// Body of an incoming-webhook call.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SlackMessage {
    pub text: String,
    pub attachments: Vec<SlackAttachment>,
}
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SlackAttachment {
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    pub title: String,
    pub title_link: String,
    pub author_icon: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    pub footer: String,
    pub footer_icon: String,
    pub ts: i64,
}

/// Outcome of posting to one webhook.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
    pub reason: String,
}

pub struct SlackClient {
    client: Client,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            thumb_suffix: ":thumb".to_owned(),
        }
    }
}

impl SlackMessage {
    pub fn from_tweet(tweet: &Tweet, request: &AlertRequest, options: &FormatOptions) -> Self {
        let (text, photos) = expand_text(tweet);

        let image_url = photos.into_iter().next();
        let thumb_url = image_url
            .as_ref()
            .map(|url| format!("{url}{}", options.thumb_suffix));
        let ts = tweet
            .created_at
            .with_timezone(&options.timezone)
            .timestamp();

        Self {
            text: HEADLINE.to_owned(),
            attachments: vec![SlackAttachment {
                author_name: tweet.user.name.clone(),
                author_link: tweet.user.url.clone(),
                title: format!("@{}", tweet.user.screen_name),
                title_link: format!("https://twitter.com/{}", request.user),
                author_icon: tweet.user.profile_image_url_https.clone(),
                text,
                image_url,
                thumb_url,
                footer: format!("<{}|View on Twitter>", request.tweet_reference),
                footer_icon: FOOTER_ICON.to_owned(),
                ts,
            }],
        }
    }
}

/// Strips media links out of the tweet text and expands shortened links.
/// Returns the new text and the photo URLs in entity order.
fn expand_text(tweet: &Tweet) -> (String, Vec<String>) {
    let mut text = tweet.full_text.clone();
    let mut photos = Vec::with_capacity(tweet.entities.media.len());

    for media in &tweet.entities.media {
        text = text.replace(&media.url, "");
        photos.push(media.media_url_https.clone());
    }
    // after media, so expanded links can't reintroduce a media short link
    for link in &tweet.entities.urls {
        text = text.replace(&link.url, &link.expanded_url);
    }

    (text, photos)
}

impl SlackClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }

    /// Posts `message` to every target in order, one at a time. A failing
    /// target is recorded and the rest are still attempted.
    pub async fn dispatch(&self, message: &SlackMessage, targets: &[String]) -> Vec<DispatchResult> {
        stream::iter(targets)
            .then(|url| self.post(url, message))
            .collect()
            .await
    }

    async fn post(&self, url: &str, message: &SlackMessage) -> DispatchResult {
        match self.client.post(url).json(message).send().await {
            Ok(res) => {
                let status = res.status();
                info!(status = status.as_u16(), "posted alert to webhook");

                DispatchResult {
                    status_code: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to post alert to webhook");

                DispatchResult {
                    status_code: 0,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::sources::twitter::{Entities, MediaEntity, TwitterUser, UrlEntity};

    fn tweet(text: &str, media: &[(&str, &str)], urls: &[(&str, &str)]) -> Tweet {
        Tweet {
            full_text: text.to_owned(),
            created_at: Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap(),
            user: TwitterUser {
                name: "Beer Co".into(),
                url: Some("https://beer.example".into()),
                screen_name: "BeerCo".into(),
                profile_image_url_https: "https://pbs.twimg.com/profile_images/1/a.jpg".into(),
            },
            entities: Entities {
                urls: urls
                    .iter()
                    .map(|(url, expanded)| UrlEntity {
                        url: url.to_string(),
                        expanded_url: expanded.to_string(),
                    })
                    .collect(),
                media: media
                    .iter()
                    .map(|(url, image)| MediaEntity {
                        url: url.to_string(),
                        media_url_https: image.to_string(),
                    })
                    .collect(),
            },
        }
    }

    fn request() -> AlertRequest {
        AlertRequest {
            tweet_reference: "https://twitter.com/beerco/status/1001".into(),
            user: "beerco".into(),
            webhook_urls: vec![],
        }
    }

    fn message(text: &str) -> SlackMessage {
        SlackMessage::from_tweet(&tweet(text, &[], &[]), &request(), &FormatOptions::default())
    }

    #[test]
    fn strips_media_and_expands_links() {
        let tweet = tweet(
            "Cans drop Friday https://t.co/link https://t.co/pic",
            &[("https://t.co/pic", "https://pbs.twimg.com/media/x.jpg")],
            &[("https://t.co/link", "https://beer.example/release")],
        );
        let msg = SlackMessage::from_tweet(&tweet, &request(), &FormatOptions::default());
        let att = &msg.attachments[0];

        assert!(!att.text.contains("https://t.co/pic"));
        assert!(!att.text.contains("https://t.co/link"));
        assert!(att.text.contains("https://beer.example/release"));
        assert_eq!(att.image_url.as_deref(), Some("https://pbs.twimg.com/media/x.jpg"));
        assert_eq!(
            att.thumb_url.as_deref(),
            Some("https://pbs.twimg.com/media/x.jpg:thumb")
        );
    }

    #[test]
    fn first_photo_is_primary() {
        let tweet = tweet(
            "two pics https://t.co/a https://t.co/b",
            &[
                ("https://t.co/a", "https://img.example/1.jpg"),
                ("https://t.co/b", "https://img.example/2.jpg"),
            ],
            &[],
        );
        let options = FormatOptions {
            thumb_suffix: "?name=thumb".into(),
            ..FormatOptions::default()
        };
        let att = &SlackMessage::from_tweet(&tweet, &request(), &options).attachments[0];

        assert_eq!(att.text, "two pics  ");
        assert_eq!(att.image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(att.thumb_url.as_deref(), Some("https://img.example/1.jpg?name=thumb"));
    }

    #[test]
    fn no_photos_means_no_images() {
        let msg = message("just words");
        let att = &msg.attachments[0];

        assert_eq!(att.image_url, None);
        assert_eq!(att.thumb_url, None);

        let raw = serde_json::to_value(&msg).unwrap();
        assert!(raw["attachments"][0].get("image_url").is_none());
        assert!(raw["attachments"][0].get("thumb_url").is_none());
    }

    #[test]
    fn fills_author_and_links() {
        let msg = message("New release");
        let att = &msg.attachments[0];

        assert_eq!(msg.text, HEADLINE);
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(att.author_name, "Beer Co");
        assert_eq!(att.author_link.as_deref(), Some("https://beer.example"));
        assert_eq!(att.title, "@BeerCo");
        assert_eq!(att.title_link, "https://twitter.com/beerco");
        assert_eq!(att.footer, "<https://twitter.com/beerco/status/1001|View on Twitter>");
        assert_eq!(att.footer_icon, FOOTER_ICON);
    }

    #[test]
    fn timestamp_is_deterministic_across_zones() {
        let utc = message("x");
        let again = message("x");
        let berlin = SlackMessage::from_tweet(
            &tweet("x", &[], &[]),
            &request(),
            &FormatOptions {
                timezone: chrono_tz::Europe::Berlin,
                ..FormatOptions::default()
            },
        );

        assert_eq!(utc, again);
        assert_eq!(utc.attachments[0].ts, 1539202764);
        assert_eq!(berlin.attachments[0].ts, 1539202764);
    }

    #[tokio::test]
    async fn dispatch_returns_one_result_per_target_in_order() {
        let ok = MockServer::start().await;
        let broken = MockServer::start().await;
        let msg = message("New release");

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!(msg)))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&ok)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&broken)
            .await;

        let targets = vec![
            format!("{}/hook", ok.uri()),
            "not a url".to_owned(),
            format!("{}/hook", broken.uri()),
            format!("{}/hook", ok.uri()),
        ];
        let results = SlackClient::new(Duration::from_secs(5))
            .unwrap()
            .dispatch(&msg, &targets)
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0],
            DispatchResult {
                status_code: 200,
                reason: "OK".into()
            }
        );
        assert_eq!(results[1].status_code, 0);
        assert_eq!(
            results[2],
            DispatchResult {
                status_code: 500,
                reason: "Internal Server Error".into()
            }
        );
        assert_eq!(results[3].status_code, 200);
    }

    #[tokio::test]
    async fn dispatch_to_no_targets_is_empty() {
        let results = SlackClient::new(Duration::from_secs(5))
            .unwrap()
            .dispatch(&message("x"), &[])
            .await;

        assert!(results.is_empty());
    }
}
