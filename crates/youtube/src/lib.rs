//! YouTube Data API v3 metadata source for the channel registry.

pub mod client;
pub mod error;

pub use {
    client::{YoutubeClient, redact_url},
    error::{Error, Result},
};
