mod app;
mod channel_commands;
mod memory_commands;
mod tool_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{
    app::App, channel_commands::ChannelAction, memory_commands::MemoryAction,
    tool_commands::ToolAction,
};

#[derive(Parser)]
#[command(name = "simargl", about = "Simargl: YouTube channel registry", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (skips discovery of simargl.{toml,yaml,json}).
    #[arg(long, global = true, env = "SIMARGL_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the registry and memory files.
    #[arg(long, global = true, env = "SIMARGL_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Channel registry management.
    Channels {
        #[command(subcommand)]
        action: ChannelAction,
    },
    /// Remembered channel facts.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Agent tools.
    Tools {
        #[command(subcommand)]
        action: ToolAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays machine-readable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<simargl_config::SimarglConfig> {
    let Some(path) = &cli.config else {
        return Ok(simargl_config::discover_and_load());
    };
    let mut config = simargl_config::load_config(path)?;
    simargl_config::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "simargl starting");

    let config = load_config(&cli)?;
    let data_dir = cli.data_dir.clone().unwrap_or_else(simargl_config::data_dir);
    debug!(data_dir = %data_dir.display(), config = ?config, "configuration loaded");

    let app = App::build(&config, &data_dir)?;

    match cli.command {
        Commands::Channels { action } => {
            channel_commands::handle_channels(&app.manager, action).await
        },
        Commands::Memory { action } => {
            memory_commands::handle_memory(&app.manager, app.memory.as_deref(), action).await
        },
        Commands::Tools { action } => tool_commands::handle_tools(&app.tools, action).await,
    }
}
