#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use {
    async_trait::async_trait,
    serde_json::json,
    simargl_channel_registry::{
        ChannelChanges, ChannelLookup, ChannelPayload, ChannelRecord, ChannelRefreshService,
        ChannelRegistry, ChannelRegistryManager, MetadataSource,
    },
};

#[test]
fn upsert_list_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channel_registry.json");
    let registry = ChannelRegistry::open(&path).unwrap();

    let stored = registry
        .upsert(
            ChannelRecord::new("UC123")
                .with_handle("@testhandle")
                .with_title("Test Channel"),
        )
        .unwrap();

    let listed = registry.list_channels();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title.as_deref(), Some("Test Channel"));
    assert!(path.exists());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw.as_array().map(Vec::len), Some(1));
    assert_eq!(raw[0]["channel_id"], "UC123");
    assert_eq!(raw[0]["handle"], "@testhandle");

    let reloaded = ChannelRegistry::open(&path).unwrap();
    assert_eq!(reloaded.list_channels(), vec![stored]);
}

struct StaticSource {
    calls: AtomicUsize,
}

#[async_trait]
impl MetadataSource for StaticSource {
    async fn fetch(&self, lookup: &ChannelLookup) -> anyhow::Result<Option<ChannelPayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ChannelLookup::Handle(handle) = lookup else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(json!({
            "id": "UCsternenko",
            "snippet": { "title": "Sternenko", "customUrl": format!("@{handle}") },
            "statistics": { "subscriberCount": "1500000", "videoCount": "900" },
            "contentDetails": { "relatedPlaylists": { "uploads": "UUsternenko" } }
        }))?))
    }
}

#[tokio::test]
async fn placeholder_lifecycle_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channel_registry.json");
    let source = Arc::new(StaticSource {
        calls: AtomicUsize::new(0),
    });

    {
        let registry = Arc::new(ChannelRegistry::open(&path).unwrap());
        let refresher = Arc::new(ChannelRefreshService::new(registry, source.clone()));
        let manager = ChannelRegistryManager::new(refresher);

        // Free text alone carries no lookup key.
        let unresolved = manager.refresh("Some Analyst Name", false).await.unwrap();
        assert!(unresolved.channel_id.starts_with("synthetic::"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let added = manager
            .add_channel("@sternenko", ChannelChanges::default().owner("Research"))
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(added.channel_id, "UCsternenko");
        assert_eq!(added.owner.as_deref(), Some("Research"));

        manager
            .update_manual_fields(
                "@sternenko",
                ChannelChanges::default().aliases(["Serhii Sternenko"]),
            )
            .unwrap()
            .unwrap();
    }

    let registry = Arc::new(ChannelRegistry::open(&path).unwrap());
    assert_eq!(registry.len(), 2);
    for identifier in [
        "Serhii Sternenko",
        "https://www.youtube.com/@sternenko",
        "UCsternenko",
        "synthetic::@sternenko",
    ] {
        let record = registry.resolve(identifier).unwrap();
        assert_eq!(record.channel_id, "UCsternenko", "via {identifier}");
        assert_eq!(record.owner.as_deref(), Some("Research"));
    }
    assert_eq!(
        registry.resolve_channel_id("serhii sternenko").as_deref(),
        Some("UCsternenko")
    );
    assert_eq!(registry.resolve_channel_id("Some Analyst Name"), None);

    // Fresh after restart: the cached uploads playlist needs no fetch.
    let refresher = ChannelRefreshService::new(registry, source.clone());
    assert_eq!(
        refresher
            .uploads_playlist_id("@sternenko")
            .await
            .unwrap()
            .as_deref(),
        Some("UUsternenko")
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
