//! Agent-callable tools over the channel registry.

use std::sync::Arc;

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    serde_json::{Value, json},
    simargl_channel_registry::{ChannelChanges, ChannelRegistryManager},
    tracing::debug,
};

use crate::tool_registry::AgentTool;

fn required_identifier<'a>(params: &'a Value, action: &str) -> Result<&'a str> {
    params
        .get("identifier")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing 'identifier' for {action}"))
}

fn force_flag(params: &Value) -> bool {
    params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn not_found(identifier: &str) -> Value {
    json!({ "found": false, "identifier": identifier })
}

/// Refreshes cached metadata for one channel.
pub struct RefreshChannelMetadataTool {
    manager: Arc<ChannelRegistryManager>,
}

impl RefreshChannelMetadataTool {
    pub fn new(manager: Arc<ChannelRegistryManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl AgentTool for RefreshChannelMetadataTool {
    fn name(&self) -> &str {
        "refresh_channel_metadata"
    }

    fn description(&self) -> &str {
        "Refresh cached YouTube channel metadata (title, handle, subscriber, video and \
         view counts). Accepts a channel id, @handle, channel URL, title, owner name or \
         alias. Cached data younger than the TTL is returned without calling the API \
         unless force is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": {
                    "type": "string",
                    "description": "Channel id, @handle, URL, title or alias"
                },
                "force": {
                    "type": "boolean",
                    "description": "Ignore the TTL and fetch now (default false)"
                }
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let identifier = required_identifier(&params, "refresh")?;
        let record = self
            .manager
            .refresh(identifier, force_flag(&params))
            .await?;
        Ok(serde_json::to_value(record)?)
    }
}

/// Lists, resolves, adds, edits and refreshes registry entries.
pub struct ChannelRegistryTool {
    manager: Arc<ChannelRegistryManager>,
}

impl ChannelRegistryTool {
    pub fn new(manager: Arc<ChannelRegistryManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl AgentTool for ChannelRegistryTool {
    fn name(&self) -> &str {
        "channel_registry"
    }

    fn description(&self) -> &str {
        "Manage the YouTube channel registry.\n\
         - list: summaries of every known channel\n\
         - resolve: find the record for an identifier\n\
         - add: register a channel (owner, notes, aliases optional) and fetch its metadata\n\
         - update: change owner, notes or aliases of a known channel; other fields are ignored\n\
         - refresh: refetch metadata when stale (or always with force)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "resolve", "add", "update", "refresh"],
                    "description": "The action to perform"
                },
                "identifier": {
                    "type": "string",
                    "description": "Channel id, @handle, URL, title or alias (all actions except list)"
                },
                "owner": { "type": "string", "description": "Owner name; empty string clears it" },
                "notes": { "type": "string", "description": "Free-form notes; empty string clears them" },
                "aliases": {
                    "description": "Extra names merged into the alias set",
                    "oneOf": [
                        { "type": "array", "items": { "type": "string" } },
                        { "type": "string", "description": "Comma-separated aliases" }
                    ]
                },
                "force": {
                    "type": "boolean",
                    "description": "Ignore the TTL (for 'refresh' action)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let action = params
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'action' parameter"))?;
        debug!(action, "channel_registry tool call");

        match action {
            "list" => Ok(serde_json::to_value(self.manager.view_summary())?),
            "resolve" => {
                let identifier = required_identifier(&params, action)?;
                match self.manager.resolve(identifier) {
                    Some(record) => Ok(serde_json::to_value(record)?),
                    None => Ok(not_found(identifier)),
                }
            },
            "add" => {
                let identifier = required_identifier(&params, action)?;
                let changes = ChannelChanges::from_json(&params);
                let record = self.manager.add_channel(identifier, changes).await?;
                Ok(serde_json::to_value(record)?)
            },
            "update" => {
                let identifier = required_identifier(&params, action)?;
                let changes = ChannelChanges::from_json(&params);
                if changes.is_empty() {
                    bail!("update needs at least one of: owner, notes, aliases");
                }
                match self.manager.update_manual_fields(identifier, changes)? {
                    Some(record) => Ok(serde_json::to_value(record)?),
                    None => Ok(not_found(identifier)),
                }
            },
            "refresh" => {
                let identifier = required_identifier(&params, action)?;
                let record = self
                    .manager
                    .refresh(identifier, force_flag(&params))
                    .await?;
                Ok(serde_json::to_value(record)?)
            },
            _ => bail!("unknown channel_registry action: {action}"),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        simargl_channel_registry::{
            ChannelLookup, ChannelPayload, ChannelRecord, ChannelRefreshService, ChannelRegistry,
            MetadataSource,
        },
    };

    struct StubSource;

    #[async_trait]
    impl MetadataSource for StubSource {
        async fn fetch(&self, lookup: &ChannelLookup) -> Result<Option<ChannelPayload>> {
            let ChannelLookup::Id(id) = lookup else {
                return Ok(None);
            };
            Ok(Some(serde_json::from_value(json!({
                "id": id,
                "snippet": { "title": format!("Title of {id}") },
                "statistics": { "subscriberCount": "7" }
            }))?))
        }
    }

    fn manager() -> (tempfile::TempDir, Arc<ChannelRegistryManager>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ChannelRegistry::open(dir.path().join("registry.json")).unwrap());
        let refresher = Arc::new(ChannelRefreshService::new(registry, Arc::new(StubSource)));
        (dir, Arc::new(ChannelRegistryManager::new(refresher)))
    }

    #[tokio::test]
    async fn refresh_tool_returns_record() {
        let (_dir, manager) = manager();
        let tool = RefreshChannelMetadataTool::new(manager);

        let out = tool
            .execute(json!({ "identifier": "UCtool", "force": true }))
            .await
            .unwrap();
        assert_eq!(out["channel_id"], "UCtool");
        assert_eq!(out["title"], "Title of UCtool");
        assert_eq!(out["metadata"]["subscriber_count"], 7);
    }

    #[tokio::test]
    async fn add_then_list_and_resolve() {
        let (_dir, manager) = manager();
        let tool = ChannelRegistryTool::new(manager);

        let added = tool
            .execute(json!({
                "action": "add",
                "identifier": "UCadd",
                "owner": "Desk",
                "aliases": "first, second"
            }))
            .await
            .unwrap();
        assert_eq!(added["owner"], "Desk");
        assert_eq!(added["title"], "Title of UCadd");

        let listed = tool.execute(json!({ "action": "list" })).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["channel_id"], "UCadd");

        let resolved = tool
            .execute(json!({ "action": "resolve", "identifier": "second" }))
            .await
            .unwrap();
        assert_eq!(resolved["channel_id"], "UCadd");
    }

    #[tokio::test]
    async fn update_ignores_non_editable_fields() {
        let (_dir, manager) = manager();
        manager
            .registry()
            .upsert(ChannelRecord::new("UCedit").with_title("Original"))
            .unwrap();
        let tool = ChannelRegistryTool::new(manager);

        let out = tool
            .execute(json!({
                "action": "update",
                "identifier": "UCedit",
                "title": "Hijacked",
                "owner": "X"
            }))
            .await
            .unwrap();
        assert_eq!(out["title"], "Original");
        assert_eq!(out["owner"], "X");

        let missing = tool
            .execute(json!({ "action": "update", "identifier": "@nobody", "owner": "X" }))
            .await
            .unwrap();
        assert_eq!(missing["found"], false);
    }

    #[rstest]
    #[case(json!({}), "missing 'action'")]
    #[case(json!({ "action": "explode" }), "unknown channel_registry action")]
    #[case(json!({ "action": "resolve" }), "missing 'identifier'")]
    #[case(json!({ "action": "add", "identifier": "  " }), "missing 'identifier'")]
    #[case(json!({ "action": "update", "identifier": "UC1", "title": "x" }), "at least one")]
    #[tokio::test]
    async fn invalid_calls_are_rejected(#[case] params: Value, #[case] expected: &str) {
        let (_dir, manager) = manager();
        let err = ChannelRegistryTool::new(manager)
            .execute(params)
            .await
            .unwrap_err();
        assert!(err.to_string().contains(expected), "{err}");
    }
}
