use std::io::{self, Read, Write};

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    config::Settings,
    relay::{Outcome, Relay, RelayError},
    slack::DispatchResult,
};

/// A CGI response: status header, JSON content type and a JSON body.
#[derive(Debug, PartialEq, Eq)]
pub struct CgiResponse {
    pub status: StatusCode,
    pub body: CgiBody,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum CgiBody {
    /// One entry per webhook, or a single entry describing a failure.
    Results(Vec<DispatchResult>),
    /// Bare `{"status_code": 200, "reason": "OK"}` for declined alerts.
    Status(DispatchResult),
}

/// Handles one CGI request end to end. Configuration is only read for POST
/// requests.
pub async fn respond(
    method: Option<&str>,
    mut input: impl Read,
    settings: Settings,
) -> CgiResponse {
    if !is_post(method) {
        return CgiResponse::method_not_allowed();
    }

    let relay = match settings.load().and_then(Relay::new) {
        Ok(relay) => relay,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return CgiResponse::status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut body = String::new();
    if let Err(e) = input.read_to_string(&mut body) {
        warn!(error = %e, "failed to read request body");
        return CgiResponse::status(StatusCode::BAD_REQUEST);
    }

    CgiResponse::from_outcome(relay.handle(&body).await)
}

impl CgiResponse {
    /// `[{"status_code": <status>, "reason": <canonical reason>}]`
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: CgiBody::Results(vec![status_result(status)]),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::status(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn from_outcome(outcome: Result<Outcome, RelayError>) -> Self {
        match outcome {
            Ok(Outcome::Dispatched(results)) => Self {
                status: StatusCode::OK,
                body: CgiBody::Results(results),
            },
            // Declines look like success to the caller.
            Ok(Outcome::Rejected | Outcome::UnknownUser(_)) => Self {
                status: StatusCode::OK,
                body: CgiBody::Status(status_result(StatusCode::OK)),
            },
            Err(e @ RelayError::MalformedInput(_)) => {
                warn!(error = %e, "rejecting request");
                Self::status(StatusCode::BAD_REQUEST)
            }
            Err(e @ RelayError::UpstreamFetch(_)) => {
                error!(error = %e, "could not fetch tweet");
                Self::status(StatusCode::BAD_GATEWAY)
            }
            Err(e @ RelayError::BrokenRules { .. }) => {
                error!(error = %e, "cannot validate tweet");
                Self::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Client errors are the caller's problem; only server-side failures
    /// make the process exit unsuccessfully.
    pub fn succeeded(&self) -> bool {
        !self.status.is_server_error()
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(
            out,
            "Status: {}\r\nContent-Type: application/json\r\n\r\n",
            self.status.as_u16()
        )?;
        serde_json::to_writer(&mut out, &self.body)?;
        writeln!(out)?;
        out.flush()
    }
}

/// Only POST requests carry an alert.
pub fn is_post(method: Option<&str>) -> bool {
    method.is_some_and(|m| m.eq_ignore_ascii_case("POST"))
}

fn status_result(status: StatusCode) -> DispatchResult {
    DispatchResult {
        status_code: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
    }
}
