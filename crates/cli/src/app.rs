//! Composition root: builds every component once and wires them together.

use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    simargl_channel_registry::{
        ChannelLookup, ChannelPayload, ChannelRefreshService, ChannelRegistry,
        ChannelRegistryManager, MetadataSource,
    },
    simargl_config::SimarglConfig,
    simargl_memory::JsonlChannelMemory,
    simargl_tools::{ChannelRegistryTool, RefreshChannelMetadataTool, ToolRegistry},
    simargl_youtube::YoutubeClient,
    tracing::{debug, warn},
};

/// Stand-in source used when no API key is configured. Every fetch fails,
/// so refreshes degrade to returning cached records.
struct OfflineSource;

#[async_trait]
impl MetadataSource for OfflineSource {
    async fn fetch(&self, lookup: &ChannelLookup) -> anyhow::Result<Option<ChannelPayload>> {
        anyhow::bail!("YouTube API key is not configured; cannot fetch {lookup}")
    }
}

pub struct App {
    pub manager: Arc<ChannelRegistryManager>,
    pub memory: Option<Arc<JsonlChannelMemory>>,
    pub tools: ToolRegistry,
}

impl App {
    pub fn build(config: &SimarglConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let registry_path = config.registry_path(data_dir);
        debug!(path = %registry_path.display(), "opening channel registry");
        let registry = Arc::new(ChannelRegistry::open(registry_path)?);

        let source: Arc<dyn MetadataSource> = match YoutubeClient::from_config(&config.youtube) {
            Ok(client) => Arc::new(client),
            Err(simargl_youtube::Error::MissingApiKey) => {
                warn!("no YouTube API key configured, channel metadata will not be refreshed");
                Arc::new(OfflineSource)
            },
            Err(e) => return Err(e.into()),
        };

        let mut refresher = ChannelRefreshService::new(registry, source)
            .with_ttl(config.registry.ttl())
            .with_fetch_timeout(config.youtube.timeout());

        let memory = config
            .memory
            .enabled
            .then(|| Arc::new(JsonlChannelMemory::new(config.memory_path(data_dir))));
        if let Some(memory) = &memory {
            refresher = refresher.with_memory(memory.clone());
        }

        let manager = Arc::new(ChannelRegistryManager::new(Arc::new(refresher)));

        let mut tools = ToolRegistry::new();
        tools.register(Box::new(RefreshChannelMetadataTool::new(Arc::clone(&manager))));
        tools.register(Box::new(ChannelRegistryTool::new(Arc::clone(&manager))));

        Ok(Self {
            manager,
            memory,
            tools,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[tokio::test]
    async fn offline_app_serves_cached_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimarglConfig::default();
        let app = App::build(&config, dir.path()).unwrap();

        assert!(dir.path().join("channel_registry.json").exists());
        assert_eq!(app.tools.tool_names(), vec![
            "channel_registry".to_string(),
            "refresh_channel_metadata".to_string(),
        ]);

        let record = app.manager.refresh("@offline", true).await.unwrap();
        assert!(record.channel_id.starts_with("synthetic::"));
        assert!(record.metadata.last_refreshed_at.is_none());

        let listed = app
            .tools
            .call("channel_registry", json!({ "action": "list" }))
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn memory_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SimarglConfig::default();
        config.memory.enabled = false;
        let app = App::build(&config, dir.path()).unwrap();
        assert!(app.memory.is_none());
    }
}
