//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Twitter v1.1 API.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use sha1::Sha1;
use urlencoding::encode;

use crate::config::TwitterCredentials;

/// Per-request values that must be fresh for every call.
pub struct Nonce {
    pub nonce: String,
    pub timestamp: u64,
}

impl Nonce {
    pub fn generate() -> Self {
        let nonce = rand::rng()
            .sample_iter(Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self { nonce, timestamp }
    }
}

/// Builds the `Authorization` header value for a request.
///
/// `params` are every query and form parameter of the request; they take part
/// in the signature but are not repeated in the header.
pub fn authorization_header(
    creds: &TwitterCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &Nonce,
) -> String {
    let timestamp = nonce.timestamp.to_string();
    let mut oauth = vec![
        ("oauth_consumer_key", creds.consumer_key.as_str()),
        ("oauth_nonce", nonce.nonce.as_str()),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", creds.token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let all: Vec<(&str, &str)> = oauth.iter().chain(params).copied().collect();
    let signature = signature(creds, method, url, &all);
    oauth.push(("oauth_signature", signature.as_str()));
    oauth.sort_unstable();

    let fields: Vec<String> = oauth
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect();

    format!("OAuth {}", fields.join(", "))
}

fn signature(
    creds: &TwitterCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k).into_owned(), encode(v).into_owned()))
        .collect();
    encoded.sort_unstable();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let base = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        encode(&creds.consumer_secret),
        encode(&creds.token_secret)
    );

    // HMAC accepts keys of any length
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(key.as_bytes()) else {
        return String::new();
    };
    mac.update(base.as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}
