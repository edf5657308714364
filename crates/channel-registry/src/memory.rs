//! Optional fact-memory capability written to after successful refreshes.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

/// A single fact worth remembering about a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFact {
    pub channel_id: String,
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ChannelFact {
    pub fn new(channel_id: impl Into<String>, fact: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            fact: fact.into(),
            owner: None,
            source: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Single-line rendering, e.g.
    /// `Channel ID: UC1 | Owner: Jane | Tags: profile | Fact: ... | Source: refresh`.
    pub fn as_text(&self) -> String {
        let mut segments = vec![format!("Channel ID: {}", self.channel_id)];
        if let Some(owner) = &self.owner {
            segments.push(format!("Owner: {owner}"));
        }
        if !self.tags.is_empty() {
            let mut tags = self.tags.clone();
            tags.sort();
            tags.dedup();
            segments.push(format!("Tags: {}", tags.join(", ")));
        }
        segments.push(format!("Fact: {}", self.fact));
        if let Some(source) = &self.source {
            segments.push(format!("Source: {source}"));
        }
        segments.join(" | ")
    }
}

/// Stores channel facts somewhere outside the registry.
#[async_trait]
pub trait ChannelMemory: Send + Sync {
    async fn remember(&self, fact: ChannelFact) -> anyhow::Result<()>;
}

/// Wraps a [`ChannelMemory`] so failures are logged and swallowed.
#[derive(Clone)]
pub struct BestEffortMemory {
    inner: Arc<dyn ChannelMemory>,
}

impl BestEffortMemory {
    pub fn new(inner: Arc<dyn ChannelMemory>) -> Self {
        Self { inner }
    }

    pub async fn remember(&self, fact: ChannelFact) {
        let channel_id = fact.channel_id.clone();
        match self.inner.remember(fact).await {
            Ok(()) => debug!(channel_id = %channel_id, "stored channel memory"),
            Err(e) => warn!(channel_id = %channel_id, error = %e, "failed to store channel memory"),
        }
    }
}
