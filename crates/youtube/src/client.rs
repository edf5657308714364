//! `channels.list` client for the YouTube Data API v3.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    simargl_channel_registry::{ChannelLookup, ChannelPayload, MetadataSource},
    simargl_config::YoutubeConfig,
    tracing::{debug, warn},
    url::Url,
};

use crate::error::{Error, Result};

const CHANNEL_PARTS: &str = "snippet,statistics,contentDetails";
const KEY_PARAM: &str = "key";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelListResponse {
    items: Vec<ChannelPayload>,
}

pub struct YoutubeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl YoutubeClient {
    /// Build a client from the `[youtube]` config section.
    pub fn from_config(config: &YoutubeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .cloned()
            .ok_or(Error::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(Error::Client)?;
        // Validate early so a bad base URL fails at startup.
        Url::parse(&config.base_url)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    /// Look up a single channel by id or handle.
    ///
    /// Returns `Ok(None)` when the API answers definitively that no such
    /// channel exists (empty `items` or HTTP 404).
    pub async fn channel(&self, lookup: &ChannelLookup) -> Result<Option<ChannelPayload>> {
        let url = self.channels_url(lookup)?;
        let body = match self.get_with_retries(&url).await {
            Ok(body) => body,
            Err(Error::Status { status: 404, .. }) => {
                debug!(%lookup, "channel not found");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };
        let response: ChannelListResponse = serde_json::from_str(&body)?;
        let channel = response.items.into_iter().next();
        if channel.is_none() {
            debug!(%lookup, "channels.list returned no items");
        }
        Ok(channel)
    }

    fn channels_url(&self, lookup: &ChannelLookup) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/channels", self.base_url))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("part", CHANNEL_PARTS);
            match lookup {
                ChannelLookup::Id(id) => query.append_pair("id", id),
                ChannelLookup::Handle(handle) => query.append_pair("forHandle", handle),
            };
            query.append_pair("maxResults", "1");
            query.append_pair(KEY_PARAM, self.api_key.expose_secret());
        }
        Ok(url)
    }

    async fn get_with_retries(&self, url: &Url) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    warn!(
                        url = %redact_url(url),
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying YouTube API request"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<String> {
        debug!(url = %redact_url(url), "GET channels.list");
        let http_error = |source: reqwest::Error| Error::Http {
            url: redact_url(url),
            source: source.without_url(),
        };

        let resp = self
            .http
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(http_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(http_error)?;
        if !status.is_success() {
            return Err(Error::Status {
                url: redact_url(url),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MetadataSource for YoutubeClient {
    async fn fetch(&self, lookup: &ChannelLookup) -> anyhow::Result<Option<ChannelPayload>> {
        Ok(self.channel(lookup).await?)
    }
}

/// Linear backoff: `step * attempt`, saturating instead of overflowing.
fn backoff_delay(step: Duration, attempt: u32) -> Duration {
    step.checked_mul(attempt).unwrap_or(Duration::MAX)
}

/// URL with the API key replaced, safe for logs and error messages.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == KEY_PARAM {
                "[REDACTED]".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return redacted.to_string();
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
