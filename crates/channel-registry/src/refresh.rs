//! TTL-gated metadata refresh: resolve, check staleness, fetch, apply,
//! persist, remember.
//!
//! Fetch failures never reach the caller; the existing record is returned
//! unchanged. Only persistence failures are errors.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    chrono::{DateTime, TimeDelta, Utc},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use crate::{
    error::Result,
    memory::{BestEffortMemory, ChannelFact, ChannelMemory},
    normalize::normalize_handle,
    source::{ChannelLookup, ChannelPayload, MetadataSource},
    store::{ChannelRegistry, merge_aliases},
    types::{CANONICAL_ID_PREFIX, ChannelRecord},
};

/// Default time-to-live for cached channel metadata.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Default upper bound on a single metadata fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const UPLOADS_PLAYLIST_PREFIX: &str = "UU";
const PROFILE_TAG: &str = "channel_profile";
const REFRESH_SOURCE: &str = "channel_refresh";

/// Fetches fresh snippet/statistics data and folds it into the registry.
pub struct ChannelRefreshService {
    registry: Arc<ChannelRegistry>,
    source: Arc<dyn MetadataSource>,
    memory: Option<BestEffortMemory>,
    ttl: TimeDelta,
    fetch_timeout: Duration,
    /// Per-channel gates so concurrent refreshes of one channel fetch once.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChannelRefreshService {
    pub fn new(registry: Arc<ChannelRegistry>, source: Arc<dyn MetadataSource>) -> Self {
        Self {
            registry,
            source,
            memory: None,
            ttl: to_time_delta(DEFAULT_TTL),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_time_delta(ttl);
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: Arc<dyn ChannelMemory>) -> Self {
        self.memory = Some(BestEffortMemory::new(memory));
        self
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Refresh metadata for `identifier` if it is stale or `force` is set.
    ///
    /// Unknown identifiers get a placeholder record first. Fresh records are
    /// returned without touching the source.
    pub async fn refresh(&self, identifier: &str, force: bool) -> Result<ChannelRecord> {
        let record = self.registry.find_or_create_by_identifier(identifier)?;
        let channel_id = record.channel_id.clone();
        let gate = self.gate(&channel_id).await;
        let result = {
            let _guard = gate.lock().await;
            self.refresh_gated(identifier, record, force).await
        };
        self.release(&channel_id, gate).await;
        result
    }

    async fn refresh_gated(
        &self,
        identifier: &str,
        record: ChannelRecord,
        force: bool,
    ) -> Result<ChannelRecord> {
        // A refresh that held the gate before us may have updated or
        // re-keyed the record.
        let record = self
            .registry
            .get(&record.channel_id)
            .or_else(|| self.registry.resolve(identifier))
            .unwrap_or(record);

        if !force && !is_stale(&record, self.ttl, Utc::now()) {
            debug!(channel_id = %record.channel_id, "channel metadata is fresh, skipping fetch");
            return Ok(record);
        }

        let Some(lookup) = ChannelLookup::for_record(&record) else {
            warn!(
                channel_id = %record.channel_id,
                "cannot determine canonical identifier for channel"
            );
            return Ok(record);
        };
        let Some(payload) = self.fetch(&record.channel_id, &lookup).await else {
            return Ok(record);
        };

        let Some(updated) = self.registry.modify(&record.channel_id, |current| {
            apply_payload(current, &payload, Utc::now());
        })?
        else {
            return Ok(record);
        };
        info!(
            channel_id = %updated.channel_id,
            title = updated.title.as_deref().unwrap_or_default(),
            subscribers = ?updated.metadata.subscriber_count,
            "refreshed channel metadata"
        );

        if let Some(memory) = &self.memory {
            memory.remember(profile_fact(&updated)).await;
        }
        Ok(updated)
    }

    /// Uploads playlist id for a channel.
    ///
    /// Uses the cached id when present (a refresh fills it from
    /// `contentDetails`), otherwise derives `UU…` from the `UC…` channel id
    /// and caches it. Placeholder channels have none.
    pub async fn uploads_playlist_id(&self, identifier: &str) -> Result<Option<String>> {
        let record = self.refresh(identifier, false).await?;
        if let Some(id) = record.uploads_playlist_id {
            return Ok(Some(id));
        }
        let Some(derived) = derive_uploads_playlist_id(&record.channel_id) else {
            return Ok(None);
        };
        self.registry.modify(&record.channel_id, |current| {
            current.uploads_playlist_id = Some(derived.clone());
            current.touch(Utc::now());
        })?;
        debug!(channel_id = %record.channel_id, playlist_id = %derived, "cached derived uploads playlist");
        Ok(Some(derived))
    }

    async fn gate(&self, channel_id: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(inflight.entry(channel_id.to_string()).or_default())
    }

    /// Drop the gate for `channel_id` once no other caller holds or awaits it.
    async fn release(&self, channel_id: &str, gate: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        // One reference lives in the map, the other is `gate`.
        if Arc::strong_count(&gate) == 2 {
            inflight.remove(channel_id);
        }
    }

    async fn fetch(&self, channel_id: &str, lookup: &ChannelLookup) -> Option<ChannelPayload> {
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch(lookup)).await {
            Ok(Ok(Some(payload))) => Some(payload),
            Ok(Ok(None)) => {
                warn!(channel_id, %lookup, "no channel data returned");
                None
            },
            Ok(Err(e)) => {
                warn!(channel_id, %lookup, error = %e, "channel metadata fetch failed");
                None
            },
            Err(_) => {
                warn!(
                    channel_id,
                    %lookup,
                    timeout_secs = self.fetch_timeout.as_secs_f64(),
                    "channel metadata fetch timed out"
                );
                None
            },
        }
    }
}

/// Whether cached metadata is due for a fetch at `now`.
pub fn is_stale(record: &ChannelRecord, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
    let Some(refreshed_at) = record.metadata.last_refreshed_at else {
        return true;
    };
    match refreshed_at.checked_add_signed(ttl) {
        Some(expires_at) => now >= expires_at,
        None => false,
    }
}

/// Overwrite the automated fields of `record` from a fetch payload.
///
/// Manual fields (`owner`, `notes`) and tags are left alone. A payload id
/// that differs from the record's key re-keys the record when persisted
/// through [`ChannelRegistry::modify`].
pub fn apply_payload(record: &mut ChannelRecord, payload: &ChannelPayload, now: DateTime<Utc>) {
    let snippet = &payload.snippet;

    if let Some(id) = non_empty(payload.id.as_deref()) {
        record.channel_id = id.to_string();
    }
    if let Some(title) = non_empty(snippet.title.as_deref()) {
        record.title = Some(title.to_string());
    }
    if let Some(description) = non_empty(snippet.description.as_deref()) {
        record.description = Some(description.to_string());
    }
    if let Some(custom_url) = non_empty(snippet.custom_url.as_deref()) {
        record.custom_url = Some(custom_url.to_string());
    }
    record.handle = normalize_handle(
        non_empty(snippet.custom_url.as_deref()).or(record.handle.as_deref()),
    );
    if let Some(uploads) = payload.uploads_playlist_id() {
        record.uploads_playlist_id = Some(uploads.to_string());
    }

    let metadata = &mut record.metadata;
    metadata.subscriber_count = payload.subscriber_count();
    metadata.video_count = payload.video_count();
    metadata.view_count = payload.view_count();
    metadata.last_refreshed_at = Some(metadata.last_refreshed_at.map_or(now, |prev| prev.max(now)));
    metadata.snapshot = payload.snapshot();

    let aliases = merge_aliases(record, std::iter::empty::<&str>(), None);
    record.aliases = aliases;
    record.touch(now);
}

/// `UCxxxx` → `UUxxxx`.
pub fn derive_uploads_playlist_id(channel_id: &str) -> Option<String> {
    let rest = channel_id.strip_prefix(CANONICAL_ID_PREFIX)?;
    (!rest.is_empty()).then(|| format!("{UPLOADS_PLAYLIST_PREFIX}{rest}"))
}

fn profile_fact(record: &ChannelRecord) -> ChannelFact {
    let mut bits = vec![format!(
        "Channel title: {}",
        record.title.as_deref().unwrap_or("Unknown")
    )];
    if let Some(handle) = normalize_handle(record.handle.as_deref()) {
        bits.push(format!("Handle: {handle}"));
    }
    if let Some(subscribers) = record.metadata.subscriber_count {
        bits.push(format!("Subscribers: {}", group_thousands(subscribers)));
    }
    if let Some(videos) = record.metadata.video_count {
        bits.push(format!("Videos: {}", group_thousands(videos)));
    }
    ChannelFact::new(&record.channel_id, bits.join(" | "))
        .with_owner(record.owner.clone())
        .with_source(REFRESH_SOURCE)
        .with_tag(PROFILE_TAG)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn to_time_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}
