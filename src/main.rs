use std::{env, io, path::PathBuf, process::ExitCode, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::Settings;
use slack::FormatOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cgi;
mod config;
mod relay;
mod request;
mod rules;
mod slack;
mod sources;

/// Relays release tweets to Slack. Runs as a CGI script: the request method
/// comes from `REQUEST_METHOD`, the JSON payload from stdin.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to Twitter API credentials.
    #[arg(long, default_value = "config/twitter.yml")]
    twitter_config: PathBuf,

    /// Path to per-user validation patterns.
    #[arg(long, default_value = "config/regexes.yml")]
    regexes: PathBuf,

    /// Time zone for message timestamps.
    #[arg(long, env = "BEERALERT_TIMEZONE", default_value = "UTC", value_parser = parse_timezone)]
    timezone: Tz,

    /// Appended to the image URL to build the thumbnail URL.
    #[arg(long, default_value = ":thumb")]
    thumb_suffix: String,

    /// Timeout for each outbound HTTP call, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Twitter REST API base URL.
    #[arg(long, default_value = "https://api.twitter.com/1.1")]
    twitter_api: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beeralert=info")),
        )
        .with_writer(io::stderr)
        .init();

    let Args {
        twitter_config,
        regexes,
        timezone,
        thumb_suffix,
        timeout,
        twitter_api,
    } = Args::parse();

    let settings = Settings {
        twitter_config,
        regexes,
        twitter_api,
        timeout: Duration::from_secs(timeout),
        format: FormatOptions {
            timezone,
            thumb_suffix,
        },
    };

    let method = env::var("REQUEST_METHOD").ok();
    let response = cgi::respond(method.as_deref(), io::stdin().lock(), settings).await;
    info!(status = response.status.as_u16(), body = ?response.body, "responding");

    let code = if response.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    if let Err(e) = response.write_to(io::stdout().lock()) {
        error!(error = %e, "failed to write response");
        return ExitCode::FAILURE;
    }

    code
}

fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|e| format!("unknown time zone {name:?}: {e}"))
}
