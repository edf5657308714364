//! The external metadata capability consumed by the refresh service.

use std::fmt;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value, json},
};

use crate::types::{ChannelRecord, is_canonical_id};

/// Key used to look a channel up at the metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookup {
    /// Real `UC…` channel id.
    Id(String),
    /// Handle without the leading `@`.
    Handle(String),
}

impl ChannelLookup {
    /// Prefer the real channel id; fall back to the handle for placeholders.
    pub fn for_record(record: &ChannelRecord) -> Option<Self> {
        if is_canonical_id(&record.channel_id) {
            return Some(Self::Id(record.channel_id.clone()));
        }
        let bare = record.handle.as_deref()?.trim().trim_start_matches('@');
        (!bare.is_empty()).then(|| Self::Handle(bare.to_string()))
    }
}

impl fmt::Display for ChannelLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Handle(handle) => write!(f, "handle:@{handle}"),
        }
    }
}

/// One channel resource as returned by `channels.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelPayload {
    pub id: Option<String>,
    pub snippet: ChannelSnippet,
    /// Raw statistics; counts arrive as strings and are parsed leniently.
    pub statistics: Map<String, Value>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelSnippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub custom_url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelPayload {
    pub fn subscriber_count(&self) -> Option<u64> {
        parse_count(self.statistics.get("subscriberCount"))
    }

    pub fn video_count(&self) -> Option<u64> {
        parse_count(self.statistics.get("videoCount"))
    }

    pub fn view_count(&self) -> Option<u64> {
        parse_count(self.statistics.get("viewCount"))
    }

    pub fn uploads_playlist_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .uploads
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Audit copy stored on the record: raw statistics plus the snippet
    /// fields worth keeping.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut snapshot = Map::new();
        snapshot.insert("statistics".into(), Value::Object(self.statistics.clone()));
        snapshot.insert(
            "snippet".into(),
            json!({
                "publishedAt": self.snippet.published_at,
                "description": self.snippet.description,
                "title": self.snippet.title,
            }),
        );
        snapshot
    }
}

/// Parse a count that may arrive as a JSON number or a numeric string.
///
/// Missing, negative or non-numeric values yield `None`.
pub fn parse_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fetches fresh channel metadata from an external source.
///
/// `Ok(None)` means the source answered definitively that no such channel
/// exists; transient failures are `Err`. Implementations own their retry
/// policy.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, lookup: &ChannelLookup) -> anyhow::Result<Option<ChannelPayload>>;
}
