use std::collections::BTreeSet;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::normalize::token_key;

/// Prefix of every real, platform-assigned channel id.
pub const CANONICAL_ID_PREFIX: &str = "UC";

/// Prefix of locally generated placeholder ids.
pub const SYNTHETIC_ID_PREFIX: &str = "synthetic::";

/// Whether `value` looks like a real platform channel id.
pub fn is_canonical_id(value: &str) -> bool {
    value.starts_with(CANONICAL_ID_PREFIX)
}

/// Whether `value` is a locally generated placeholder id.
pub fn is_synthetic_id(value: &str) -> bool {
    value.starts_with(SYNTHETIC_ID_PREFIX)
}

/// Latest known statistics for a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMetadata {
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
    pub view_count: Option<u64>,
    pub latest_video_id: Option<String>,
    /// `None` until the first successful fetch; only ever moves forward.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Trimmed copy of the last raw fetch payload, kept for auditing.
    pub snapshot: serde_json::Map<String, serde_json::Value>,
}

/// Canonical registry entry for a YouTube channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Real channel id (`UC…`) or a `synthetic::` placeholder.
    pub channel_id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub custom_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Manual field: never written by automated refresh.
    #[serde(default)]
    pub owner: Option<String>,
    /// Manual field: never written by automated refresh.
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub metadata: ChannelMetadata,
    #[serde(default)]
    pub uploads_playlist_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// Create an empty record keyed by `channel_id`, stamped with the current time.
    pub fn new(channel_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            channel_id: channel_id.into(),
            handle: None,
            custom_url: None,
            title: None,
            description: None,
            owner: None,
            notes: None,
            tags: Vec::new(),
            aliases: Vec::new(),
            metadata: ChannelMetadata::default(),
            uploads_playlist_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = crate::normalize::normalize_handle(Some(&handle.into()));
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether the record is still keyed by a placeholder id.
    pub fn is_placeholder(&self) -> bool {
        !is_canonical_id(&self.channel_id)
    }

    /// Bump `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Lowercased tokens this record answers to during resolution.
    ///
    /// Covers the channel id, handle (with and without `@`), custom URL,
    /// title, owner and every alias.
    pub fn search_tokens(&self) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        tokens.insert(token_key(&self.channel_id));

        let values = [
            self.handle.as_deref(),
            self.custom_url.as_deref(),
            self.title.as_deref(),
            self.owner.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.aliases.iter().map(String::as_str));

        for value in values {
            let key = token_key(value);
            if key.is_empty() {
                continue;
            }
            let bare = key.trim_start_matches('@').to_string();
            if !bare.is_empty() {
                tokens.insert(bare);
            }
            tokens.insert(key);
        }
        tokens
    }
}

/// Compact projection of a record for listings and UI display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub handle: Option<String>,
    pub title: Option<String>,
    pub owner: Option<String>,
    pub notes: Option<String>,
    pub aliases: Vec<String>,
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
    pub view_count: Option<u64>,
    /// RFC 3339 timestamp of the last successful refresh.
    pub last_refreshed_at: Option<String>,
}

impl From<&ChannelRecord> for ChannelSummary {
    fn from(record: &ChannelRecord) -> Self {
        Self {
            channel_id: record.channel_id.clone(),
            handle: crate::normalize::normalize_handle(record.handle.as_deref()),
            title: record.title.clone(),
            owner: record.owner.clone(),
            notes: record.notes.clone(),
            aliases: record.aliases.clone(),
            subscriber_count: record.metadata.subscriber_count,
            video_count: record.metadata.video_count,
            view_count: record.metadata.view_count,
            last_refreshed_at: record.metadata.last_refreshed_at.map(|t| t.to_rfc3339()),
        }
    }
}
