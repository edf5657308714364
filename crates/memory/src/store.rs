use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    fd_lock::RwLock,
    serde::{Deserialize, Serialize},
    simargl_channel_registry::{ChannelFact, ChannelMemory},
    tracing::{debug, warn},
};

/// A fact as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFact {
    #[serde(flatten)]
    pub fact: ChannelFact,
    pub recorded_at: DateTime<Utc>,
}

/// Latest fact per channel id.
type LatestFacts = HashMap<String, ChannelFact>;

/// Append-only JSONL log of channel facts with file locking.
pub struct JsonlChannelMemory {
    path: PathBuf,
    /// Latest fact per channel, loaded from the log on first append. Also
    /// serialises the compare-then-append step within this process.
    latest: tokio::sync::Mutex<Option<LatestFacts>>,
}

impl JsonlChannelMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latest: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a fact unless it repeats the latest fact for its channel.
    ///
    /// Returns whether a line was written. The log is read once to seed the
    /// per-channel cache; later appends only compare against the cache.
    pub async fn append(&self, fact: ChannelFact) -> Result<bool> {
        let mut latest = self.latest.lock().await;
        if latest.is_none() {
            let path = self.path.clone();
            let loaded = tokio::task::spawn_blocking(move || -> Result<LatestFacts> {
                Ok(read_facts(&path)?
                    .into_iter()
                    .map(|stored| (stored.fact.channel_id.clone(), stored.fact))
                    .collect())
            })
            .await??;
            debug!(path = %self.path.display(), channels = loaded.len(), "loaded latest channel facts");
            *latest = Some(loaded);
        }
        let cache = latest.get_or_insert_with(LatestFacts::new);

        if cache.get(&fact.channel_id) == Some(&fact) {
            debug!(path = %self.path.display(), channel_id = %fact.channel_id, "skipping duplicate channel fact");
            return Ok(false);
        }

        let path = self.path.clone();
        let line = serde_json::to_string(&StoredFact {
            fact: fact.clone(),
            recorded_at: Utc::now(),
        })?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| anyhow::anyhow!("lock failed: {e}"))?;
            writeln!(*guard, "{line}")?;
            Ok(())
        })
        .await??;

        cache.insert(fact.channel_id.clone(), fact);
        Ok(true)
    }

    /// Most recent facts for a channel, newest first.
    pub async fn recall(&self, channel_id: &str, limit: usize) -> Result<Vec<StoredFact>> {
        let path = self.path.clone();
        let channel_id = channel_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredFact>> {
            Ok(read_facts(&path)?
                .into_iter()
                .rev()
                .filter(|stored| stored.fact.channel_id == channel_id)
                .take(limit)
                .collect())
        })
        .await?
    }
}

#[async_trait]
impl ChannelMemory for JsonlChannelMemory {
    async fn remember(&self, fact: ChannelFact) -> Result<()> {
        self.append(fact).await.map(|_| ())
    }
}

fn read_facts(path: &Path) -> Result<Vec<StoredFact>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let file = File::open(path)?;
    let lock = RwLock::new(file);
    let guard = lock
        .read()
        .map_err(|e| anyhow::anyhow!("lock failed: {e}"))?;

    let mut facts = Vec::new();
    for line in BufReader::new(&*guard).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(fact) => facts.push(fact),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed channel fact"),
        }
    }
    Ok(facts)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> (tempfile::TempDir, JsonlChannelMemory) {
        let dir = tempfile::tempdir().unwrap();
        let memory = JsonlChannelMemory::new(dir.path().join("facts").join("memory.jsonl"));
        (dir, memory)
    }

    fn fact(channel_id: &str, text: &str) -> ChannelFact {
        ChannelFact::new(channel_id, text)
            .with_source("channel_refresh")
            .with_tag("channel_profile")
    }

    #[tokio::test]
    async fn recall_is_newest_first_per_channel() {
        let (_dir, memory) = memory();
        memory.append(fact("UC1", "Subscribers: 1")).await.unwrap();
        memory.append(fact("UC2", "other channel")).await.unwrap();
        memory.append(fact("UC1", "Subscribers: 2")).await.unwrap();
        memory.append(fact("UC1", "Subscribers: 3")).await.unwrap();

        let recalled = memory.recall("UC1", 2).await.unwrap();
        let texts: Vec<&str> = recalled.iter().map(|s| s.fact.fact.as_str()).collect();
        assert_eq!(texts, vec!["Subscribers: 3", "Subscribers: 2"]);
        assert!(recalled[0].recorded_at >= recalled[1].recorded_at);

        assert!(memory.recall("UCnone", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_latest_fact_is_skipped() {
        let (_dir, memory) = memory();
        assert!(memory.append(fact("UC1", "same")).await.unwrap());
        assert!(!memory.append(fact("UC1", "same")).await.unwrap());
        assert!(memory.append(fact("UC2", "same")).await.unwrap());
        assert!(memory.append(fact("UC1", "changed")).await.unwrap());
        assert!(memory.append(fact("UC1", "same")).await.unwrap());

        assert_eq!(memory.recall("UC1", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn latest_facts_are_loaded_once_per_instance() {
        let (_dir, memory) = memory();
        assert!(memory.append(fact("UC1", "same")).await.unwrap());

        // A new instance seeds its cache from the existing log.
        let reopened = JsonlChannelMemory::new(memory.path());
        assert!(!reopened.append(fact("UC1", "same")).await.unwrap());
        assert!(reopened.append(fact("UC1", "next")).await.unwrap());

        // After the first append the log is not re-read for comparisons.
        fs::write(memory.path(), "").unwrap();
        assert!(!reopened.append(fact("UC1", "next")).await.unwrap());
        let cached = reopened.latest.lock().await;
        assert_eq!(cached.as_ref().unwrap()["UC1"].fact, "next");
    }

    #[tokio::test]
    async fn remember_goes_through_trait() {
        let (_dir, memory) = memory();
        let shared: std::sync::Arc<dyn ChannelMemory> = std::sync::Arc::new(memory);
        shared.remember(fact("UC9", "hello")).await.unwrap();
        shared.remember(fact("UC9", "hello")).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let (_dir, memory) = memory();
        memory.append(fact("UC1", "good")).await.unwrap();
        let mut file = OpenOptions::new().append(true).open(memory.path()).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();

        let recalled = memory.recall("UC1", 10).await.unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].fact.tags, vec!["channel_profile".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_recalls_nothing() {
        let (_dir, memory) = memory();
        assert!(memory.recall("UC1", 3).await.unwrap().is_empty());
    }
}
