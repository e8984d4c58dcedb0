use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::api::DEFAULT_UPDATE_BUFFER;

pub const DEFAULT_FEED_URL: &str = "http://www.lotterynumbersxml.com/lotterydata/lottery.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => anyhow::bail!("LOTTO_FEED_OUTPUT must be text or json, got {:?}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub feed_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
    pub update_buffer: usize,
    pub output: OutputFormat,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            poll_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            update_buffer: DEFAULT_UPDATE_BUFFER,
            output: OutputFormat::Text,
        }
    }
}

/// Load configuration from `LOTTO_FEED_*` environment variables.
pub fn load() -> Result<FeedConfig> {
    from_lookup(|key| env::var(key).ok())
}

fn from_lookup<F>(lookup: F) -> Result<FeedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = FeedConfig::default();

    let feed_url = lookup("LOTTO_FEED_URL").unwrap_or(defaults.feed_url);
    let poll_interval = match lookup("LOTTO_FEED_POLL_SECS") {
        Some(v) => Duration::from_secs(parse_number("LOTTO_FEED_POLL_SECS", &v)?),
        None => defaults.poll_interval,
    };
    let request_timeout = match lookup("LOTTO_FEED_TIMEOUT_SECS") {
        Some(v) => Duration::from_secs(parse_number("LOTTO_FEED_TIMEOUT_SECS", &v)?),
        None => defaults.request_timeout,
    };
    let update_buffer = match lookup("LOTTO_FEED_BUFFER") {
        Some(v) => parse_number("LOTTO_FEED_BUFFER", &v)?,
        None => defaults.update_buffer,
    };
    let user_agent = lookup("LOTTO_FEED_USER_AGENT").filter(|ua| !ua.is_empty());
    let output = match lookup("LOTTO_FEED_OUTPUT") {
        Some(v) => v.parse()?,
        None => defaults.output,
    };

    if poll_interval.is_zero() {
        anyhow::bail!("LOTTO_FEED_POLL_SECS must be greater than zero");
    }

    Ok(FeedConfig {
        feed_url,
        poll_interval,
        request_timeout,
        user_agent,
        update_buffer,
        output,
    })
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number, got {:?}", key, value))
}
