//! Manual-field façade over the registry and the refresh service.

use std::sync::Arc;

use tracing::debug;

use crate::{
    changes::ChannelChanges,
    error::Result,
    normalize::dedupe_aliases,
    refresh::ChannelRefreshService,
    store::ChannelRegistry,
    types::{ChannelRecord, ChannelSummary},
};

pub struct ChannelRegistryManager {
    registry: Arc<ChannelRegistry>,
    refresher: Arc<ChannelRefreshService>,
}

impl ChannelRegistryManager {
    pub fn new(refresher: Arc<ChannelRefreshService>) -> Self {
        Self {
            registry: Arc::clone(refresher.registry()),
            refresher,
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn refresher(&self) -> &Arc<ChannelRefreshService> {
        &self.refresher
    }

    /// Compact projection of every record, in listing order.
    pub fn view_summary(&self) -> Vec<ChannelSummary> {
        self.registry
            .list_channels()
            .iter()
            .map(ChannelSummary::from)
            .collect()
    }

    pub fn resolve(&self, identifier: &str) -> Option<ChannelRecord> {
        self.registry.resolve(identifier)
    }

    /// Register a channel, apply manual fields, then force a refresh.
    ///
    /// The identifier itself is always kept as an alias.
    pub async fn add_channel(
        &self,
        identifier: &str,
        changes: ChannelChanges,
    ) -> Result<ChannelRecord> {
        let cleaned = identifier.trim();
        let record = self.registry.find_or_create_by_identifier(cleaned)?;

        let extra = changes.aliases.clone().unwrap_or_default();
        let changes = ChannelChanges {
            aliases: Some(dedupe_aliases(extra.into_iter().map(Some))),
            base_identifier: Some(cleaned.to_string()),
            ..changes
        };
        self.registry.update_partial(&record.channel_id, changes)?;

        self.refresher.refresh(&record.channel_id, true).await
    }

    /// Apply manual fields to an existing channel without fetching.
    ///
    /// Returns `Ok(None)` when the identifier does not resolve.
    pub fn update_manual_fields(
        &self,
        identifier: &str,
        changes: ChannelChanges,
    ) -> Result<Option<ChannelRecord>> {
        let Some(record) = self.registry.resolve(identifier) else {
            debug!(identifier, "manual update for unknown channel");
            return Ok(None);
        };
        let mut changes = changes;
        if changes.aliases.is_some() && changes.base_identifier.is_none() {
            changes.base_identifier = Some(identifier.trim().to_string());
        }
        self.registry.update_partial(&record.channel_id, changes)
    }

    pub async fn refresh(&self, identifier: &str, force: bool) -> Result<ChannelRecord> {
        self.refresher.refresh(identifier, force).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::source::{ChannelLookup, ChannelPayload, MetadataSource},
        async_trait::async_trait,
        serde_json::json,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        async fn fetch(&self, lookup: &ChannelLookup) -> anyhow::Result<Option<ChannelPayload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = match lookup {
                ChannelLookup::Id(id) => id.clone(),
                ChannelLookup::Handle(handle) => format!("UC{handle}"),
            };
            Ok(Some(serde_json::from_value(json!({
                "id": id,
                "snippet": { "title": "Remote Title", "customUrl": "@remote" },
                "statistics": { "subscriberCount": "10", "videoCount": "2" }
            }))?))
        }
    }

    fn manager() -> (tempfile::TempDir, Arc<CountingSource>, ChannelRegistryManager) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ChannelRegistry::open(dir.path().join("registry.json")).unwrap());
        let source = Arc::new(CountingSource::default());
        let refresher = Arc::new(ChannelRefreshService::new(registry, source.clone()));
        (dir, source, ChannelRegistryManager::new(refresher))
    }

    #[tokio::test]
    async fn add_channel_applies_manual_fields_and_forces_refresh() {
        let (_dir, source, manager) = manager();

        let record = manager
            .add_channel(
                "UCadded",
                ChannelChanges::default()
                    .owner("Desk A")
                    .notes("watch list")
                    .aliases(["Nickname", "nickname"]),
            )
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.title.as_deref(), Some("Remote Title"));
        assert_eq!(record.owner.as_deref(), Some("Desk A"));
        assert_eq!(record.notes.as_deref(), Some("watch list"));
        assert!(record.metadata.last_refreshed_at.is_some());
        let nicknames = record
            .aliases
            .iter()
            .filter(|a| a.eq_ignore_ascii_case("nickname"))
            .count();
        assert_eq!(nicknames, 1);

        // Adding again still forces a fetch.
        manager
            .add_channel("UCadded", ChannelChanges::default())
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn add_channel_by_handle_promotes_and_keeps_identifier_alias() {
        let (_dir, _source, manager) = manager();

        let record = manager
            .add_channel("@newcomer", ChannelChanges::default().owner("Desk B"))
            .await
            .unwrap();

        assert_eq!(record.channel_id, "UCnewcomer");
        assert_eq!(record.owner.as_deref(), Some("Desk B"));
        assert!(record.aliases.contains(&"@newcomer".to_string()));
        assert_eq!(manager.resolve("@newcomer").unwrap().channel_id, "UCnewcomer");
        assert_eq!(manager.registry().len(), 1);
    }

    #[tokio::test]
    async fn update_manual_fields_requires_existing_channel() {
        let (_dir, source, manager) = manager();
        assert!(
            manager
                .update_manual_fields("@ghost", ChannelChanges::default().owner("x"))
                .unwrap()
                .is_none()
        );
        assert!(manager.registry().is_empty());

        manager
            .registry()
            .upsert(ChannelRecord::new("UCknown").with_handle("@known"))
            .unwrap();
        let updated = manager
            .update_manual_fields("@known", ChannelChanges::default().notes("checked"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("checked"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn view_summary_projects_every_record() {
        let (_dir, _source, manager) = manager();
        manager.refresh("UCone", false).await.unwrap();
        manager
            .registry()
            .upsert(ChannelRecord::new("UCtwo").with_title("Another"))
            .unwrap();

        let summary = manager.view_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].channel_id, "UCtwo");
        assert_eq!(summary[1].channel_id, "UCone");
        assert_eq!(summary[1].subscriber_count, Some(10));
        assert!(summary[1].last_refreshed_at.is_some());
    }
}
