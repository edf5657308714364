//! Agent-callable tools and the registry that dispatches them.

pub mod channel_tools;
pub mod tool_registry;

pub use {
    channel_tools::{ChannelRegistryTool, RefreshChannelMetadataTool},
    tool_registry::{AgentTool, ToolRegistry},
};
