use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("YouTube API key is not configured (set YOUTUBE_API_KEY or [youtube].api_key)")]
    MissingApiKey,

    #[error("invalid YouTube API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure. `url` is redacted.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode channels response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Whether another attempt could succeed: transport errors, rate limits
    /// and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
