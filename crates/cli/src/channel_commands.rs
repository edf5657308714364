use {
    clap::Subcommand,
    simargl_channel_registry::{ChannelChanges, ChannelRegistryManager},
};

use crate::print_json;

#[derive(Subcommand)]
pub enum ChannelAction {
    /// List every registered channel.
    List,
    /// Show the record an identifier resolves to.
    Resolve {
        /// Channel id, @handle, URL, title, owner or alias.
        identifier: String,
    },
    /// Register a channel and fetch its metadata.
    Add {
        identifier: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Extra alias (repeatable).
        #[arg(long = "alias")]
        aliases: Vec<String>,
    },
    /// Edit the owner, notes or aliases of a known channel.
    Update {
        identifier: String,
        /// New owner; pass an empty string to clear.
        #[arg(long)]
        owner: Option<String>,
        /// New notes; pass an empty string to clear.
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "alias")]
        aliases: Vec<String>,
    },
    /// Refetch metadata when stale.
    Refresh {
        identifier: String,
        /// Ignore the TTL.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the uploads playlist id of a channel.
    Uploads { identifier: String },
}

fn changes(owner: Option<String>, notes: Option<String>, aliases: Vec<String>) -> ChannelChanges {
    ChannelChanges {
        owner,
        notes,
        aliases: (!aliases.is_empty()).then_some(aliases),
        base_identifier: None,
    }
}

pub async fn handle_channels(
    manager: &ChannelRegistryManager,
    action: ChannelAction,
) -> anyhow::Result<()> {
    match action {
        ChannelAction::List => print_json(&manager.view_summary()),
        ChannelAction::Resolve { identifier } => match manager.resolve(&identifier) {
            Some(record) => print_json(&record),
            None => anyhow::bail!("no channel matches '{identifier}'"),
        },
        ChannelAction::Add {
            identifier,
            owner,
            notes,
            aliases,
        } => {
            let record = manager
                .add_channel(&identifier, changes(owner, notes, aliases))
                .await?;
            print_json(&record)
        },
        ChannelAction::Update {
            identifier,
            owner,
            notes,
            aliases,
        } => {
            let changes = changes(owner, notes, aliases);
            if changes.is_empty() {
                anyhow::bail!("nothing to update: pass --owner, --notes or --alias");
            }
            match manager.update_manual_fields(&identifier, changes)? {
                Some(record) => print_json(&record),
                None => anyhow::bail!("no channel matches '{identifier}'"),
            }
        },
        ChannelAction::Refresh { identifier, force } => {
            let record = manager.refresh(&identifier, force).await?;
            print_json(&record)
        },
        ChannelAction::Uploads { identifier } => {
            match manager.refresher().uploads_playlist_id(&identifier).await? {
                Some(playlist_id) => {
                    println!("{playlist_id}");
                    Ok(())
                },
                None => anyhow::bail!("no uploads playlist known for '{identifier}'"),
            }
        },
    }
}
