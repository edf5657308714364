use {
    clap::Subcommand,
    simargl_channel_registry::ChannelRegistryManager,
    simargl_memory::JsonlChannelMemory,
};

use crate::print_json;

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Show the facts remembered about a channel, newest first.
    Recall {
        /// Channel id, @handle, URL, title, owner or alias.
        identifier: String,
        /// Maximum number of facts to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Print the rendered text lines instead of JSON.
        #[arg(long, default_value_t = false)]
        text: bool,
    },
}

pub async fn handle_memory(
    manager: &ChannelRegistryManager,
    memory: Option<&JsonlChannelMemory>,
    action: MemoryAction,
) -> anyhow::Result<()> {
    let Some(memory) = memory else {
        anyhow::bail!("channel memory is disabled ([memory].enabled = false)");
    };
    match action {
        MemoryAction::Recall {
            identifier,
            limit,
            text,
        } => {
            let channel_id = manager
                .resolve(&identifier)
                .map(|record| record.channel_id)
                .unwrap_or_else(|| identifier.trim().to_string());
            let facts = memory.recall(&channel_id, limit).await?;
            if !text {
                return print_json(&facts);
            }
            if facts.is_empty() {
                println!("No facts remembered for {channel_id}.");
            }
            for stored in &facts {
                println!("{}  {}", stored.recorded_at.to_rfc3339(), stored.fact.as_text());
            }
            Ok(())
        },
    }
}
