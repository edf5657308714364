//! JSON file-backed channel registry with atomic writes.
//!
//! The whole table lives in memory behind a mutex and is written back to a
//! single JSON array after every mutation. Each mutation is staged on a copy
//! of the table, written to a temp file in the same directory, renamed over
//! the store file, and only then committed in memory, so a failed write
//! leaves both the file and the in-memory view untouched.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use {
    chrono::Utc,
    tracing::{debug, info, warn},
};

use crate::{
    changes::ChannelChanges,
    error::{Error, Result},
    identity::{deduce_channel_id, expand_identifier, extract_custom_slug, extract_handle},
    normalize::{dedupe_aliases, normalize_handle},
    types::{ChannelRecord, is_canonical_id},
};

type Records = BTreeMap<String, ChannelRecord>;

/// Durable table of channel records keyed by channel id.
///
/// Construct once with [`ChannelRegistry::open`] and share it by `Arc`.
/// All methods take `&self`; mutations are serialised internally.
pub struct ChannelRegistry {
    path: PathBuf,
    records: Mutex<Records>,
}

impl ChannelRegistry {
    /// Load the registry at `path`, creating an empty store file if missing.
    ///
    /// A malformed file is backed up to `<path>.bak` and treated as an empty
    /// store; individual malformed entries are skipped. An existing file
    /// that cannot be read, or a store file that cannot be written, is an
    /// error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let registry = match fs::read_to_string(&path) {
            Ok(data) => Self {
                records: Mutex::new(parse_records(&data, &path)),
                path,
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let registry = Self {
                    records: Mutex::new(Records::new()),
                    path,
                };
                registry.persist(&Records::new())?;
                debug!(path = %registry.path.display(), "created empty channel registry");
                registry
            },
            Err(e) => return Err(e.into()),
        };
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Exact primary-key lookup.
    pub fn get(&self, channel_id: &str) -> Option<ChannelRecord> {
        self.lock().get(channel_id).cloned()
    }

    /// All records, ordered by title and falling back to the channel id.
    pub fn list_channels(&self) -> Vec<ChannelRecord> {
        let mut records: Vec<ChannelRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));
        records
    }

    /// Insert or replace a record by channel id and persist.
    pub fn upsert(&self, mut record: ChannelRecord) -> Result<ChannelRecord> {
        record.handle = normalize_handle(record.handle.as_deref());
        record.touch(Utc::now());
        let mut records = self.lock();
        self.write(&mut records, |next| {
            next.insert(record.channel_id.clone(), record.clone());
        })?;
        Ok(record)
    }

    /// Apply a manual edit to an existing record.
    ///
    /// Returns `Ok(None)` for an unknown id. Only the fields carried by
    /// [`ChannelChanges`] are touched; `None` values are skipped, aliases are
    /// merged rather than replaced, and a blank owner or notes clears the
    /// field. Nothing is written when no field is provided.
    pub fn update_partial(
        &self,
        channel_id: &str,
        changes: ChannelChanges,
    ) -> Result<Option<ChannelRecord>> {
        let mut records = self.lock();
        let Some(mut record) = records.get(channel_id).cloned() else {
            debug!(channel_id, "partial update for unknown channel");
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(record));
        }

        if let Some(aliases) = &changes.aliases {
            record.aliases = merge_aliases(&record, aliases, changes.base_identifier.as_deref());
        }
        if let Some(owner) = changes.owner {
            record.owner = non_blank(owner);
        }
        if let Some(notes) = changes.notes {
            record.notes = non_blank(notes);
        }
        record.touch(Utc::now());

        self.write(&mut records, |next| {
            next.insert(record.channel_id.clone(), record.clone());
        })?;
        Ok(Some(record))
    }

    /// Apply `f` to the current version of a record and persist the result.
    ///
    /// The closure runs under the store lock, so concurrent edits are never
    /// lost. When `f` changes `channel_id` the record is re-keyed: the old
    /// key is removed and kept as an alias, and if a record already exists
    /// under the new key the two are merged. Returns
    /// `Ok(None)` for an unknown id; an unchanged record is not rewritten.
    pub fn modify<F>(&self, channel_id: &str, f: F) -> Result<Option<ChannelRecord>>
    where
        F: FnOnce(&mut ChannelRecord),
    {
        let mut records = self.lock();
        let Some(current) = records.get(channel_id) else {
            return Ok(None);
        };
        let mut record = current.clone();
        f(&mut record);
        if &record == current {
            return Ok(Some(record));
        }

        let mut stored = record.clone();
        self.write(&mut records, |next| {
            if stored.channel_id != channel_id {
                next.remove(channel_id);
                if let Some(existing) = next.remove(&stored.channel_id) {
                    stored = absorb(existing, stored.clone());
                }
                stored.aliases = merge_aliases(&stored, [channel_id], None);
                info!(
                    from = channel_id,
                    to = %stored.channel_id,
                    "re-keyed channel record"
                );
            }
            next.insert(stored.channel_id.clone(), stored.clone());
        })?;
        Ok(Some(stored))
    }

    /// Resolve a handle, URL, channel id, title, owner name or alias to a
    /// record.
    ///
    /// Canonical ids are checked against the primary key first so they are
    /// never shadowed by another record's alias.
    pub fn resolve(&self, identifier: &str) -> Option<ChannelRecord> {
        resolve_in(&self.lock(), identifier)
    }

    /// Real channel id for an identifier, if one is known.
    ///
    /// A raw `UC…` identifier is returned as-is; anything else must resolve
    /// to a record that is no longer keyed by a placeholder.
    pub fn resolve_channel_id(&self, identifier: &str) -> Option<String> {
        let cleaned = identifier.trim();
        if is_canonical_id(cleaned) {
            return Some(cleaned.to_string());
        }
        self.resolve(cleaned)
            .filter(|record| !record.is_placeholder())
            .map(|record| record.channel_id)
    }

    /// Resolve an identifier, or create and persist a placeholder record for
    /// it. Resolution and creation happen under one lock, so concurrent
    /// callers with the same new identifier share a single record.
    pub fn find_or_create_by_identifier(&self, identifier: &str) -> Result<ChannelRecord> {
        let cleaned = identifier.trim();
        if cleaned.is_empty() {
            return Err(Error::message("channel identifier is empty"));
        }

        let mut records = self.lock();
        if let Some(existing) = resolve_in(&records, cleaned) {
            return Ok(existing);
        }
        let channel_id = deduce_channel_id(cleaned);
        if let Some(existing) = records.get(&channel_id) {
            return Ok(existing.clone());
        }

        let mut record = ChannelRecord::new(channel_id);
        record.handle = extract_handle(cleaned);
        record.custom_url = extract_custom_slug(cleaned);
        record.aliases = dedupe_aliases([Some(cleaned), record.handle.as_deref()]);

        self.write(&mut records, |next| {
            next.insert(record.channel_id.clone(), record.clone());
        })?;
        info!(
            channel_id = %record.channel_id,
            identifier = cleaned,
            "created channel record"
        );
        Ok(record)
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stage a change on a copy of the table, persist it, then commit.
    fn write(&self, records: &mut Records, apply: impl FnOnce(&mut Records)) -> Result<()> {
        let mut next = records.clone();
        apply(&mut next);
        self.persist(&next)?;
        *records = next;
        Ok(())
    }

    /// Write the table atomically via temp file + rename.
    fn persist(&self, records: &Records) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::persist(&self.path, e))?;
        }
        let entries: Vec<&ChannelRecord> = records.values().collect();
        let data = serde_json::to_string_pretty(&entries)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = sibling_path(&self.path, &format!(".tmp.{nanos}"));
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(data.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, &self.path)) {
            warn!(
                temp_path = %temp_path.display(),
                path = %self.path.display(),
                error = %e,
                "failed to atomically replace channel registry"
            );
            let _ = fs::remove_file(&temp_path);
            return Err(Error::persist(&self.path, e));
        }
        debug!(path = %self.path.display(), records = records.len(), "persisted channel registry");
        Ok(())
    }
}

/// Merge alias candidates into a record's alias set.
///
/// The result is the existing aliases, the new candidates, the base
/// identifier, the normalized handle, the channel id and the title,
/// deduplicated case-insensitively with first-seen casing kept.
pub fn merge_aliases<I, S>(
    record: &ChannelRecord,
    aliases: I,
    base_identifier: Option<&str>,
) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates: Vec<Option<String>> = record.aliases.iter().cloned().map(Some).collect();
    candidates.extend(aliases.into_iter().map(|a| Some(a.as_ref().to_string())));
    candidates.extend([
        base_identifier.map(str::to_string),
        normalize_handle(record.handle.as_deref()),
        Some(record.channel_id.clone()),
        record.title.clone(),
    ]);
    dedupe_aliases(candidates)
}

/// Fold a re-keyed record into the record already stored under its new id.
///
/// Automated fields come from `incoming` (the freshest fetch); manual fields
/// prefer `existing` and fall back to `incoming`; aliases and tags are
/// unioned and the earliest creation time is kept.
fn absorb(existing: ChannelRecord, mut incoming: ChannelRecord) -> ChannelRecord {
    incoming.owner = existing.owner.or(incoming.owner);
    incoming.notes = existing.notes.or(incoming.notes);
    incoming.custom_url = incoming.custom_url.or(existing.custom_url);
    incoming.uploads_playlist_id = incoming.uploads_playlist_id.or(existing.uploads_playlist_id);
    incoming.metadata.last_refreshed_at = incoming
        .metadata
        .last_refreshed_at
        .max(existing.metadata.last_refreshed_at);
    incoming.tags = dedupe_aliases(existing.tags.into_iter().chain(incoming.tags).map(Some));
    incoming.aliases = dedupe_aliases(
        existing
            .aliases
            .into_iter()
            .chain(incoming.aliases)
            .map(Some),
    );
    incoming.created_at = existing.created_at.min(incoming.created_at);
    incoming.updated_at = incoming.updated_at.max(incoming.created_at);
    incoming
}

fn resolve_in(records: &Records, identifier: &str) -> Option<ChannelRecord> {
    let tokens = expand_identifier(identifier);
    if tokens.is_empty() {
        return None;
    }
    for candidate in &tokens.canonical {
        if let Some(record) = records.get(candidate) {
            return Some(record.clone());
        }
    }
    records
        .values()
        .find(|record| !record.search_tokens().is_disjoint(&tokens.search))
        .cloned()
}

fn parse_records(data: &str, path: &Path) -> Records {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(data) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "channel registry file is invalid JSON, starting empty"
            );
            let backup = sibling_path(path, ".bak");
            if let Err(e) = fs::copy(path, &backup) {
                warn!(path = %backup.display(), error = %e, "failed to back up channel registry");
            }
            return Records::new();
        },
    };

    let mut records = Records::new();
    for entry in entries {
        match serde_json::from_value::<ChannelRecord>(entry) {
            Ok(record) => {
                records.insert(record.channel_id.clone(), record);
            },
            Err(e) => warn!(error = %e, "skipping invalid channel entry"),
        }
    }
    records
}

/// `path` with `suffix` appended to its file name, e.g. `channels.db.bak`.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn sort_key(record: &ChannelRecord) -> &str {
    record.title.as_deref().unwrap_or(&record.channel_id)
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}
