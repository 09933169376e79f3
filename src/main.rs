//! # Chat Recall CLI (`recall`)
//!
//! Index chat channels into an in-memory semantic index and ask questions
//! over them, from the shell or through the HTTP / MCP tool servers.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall channels` | List channels the configured source can see |
//! | `recall index [--channel C] [--limit N]` | Index messages (in-process only) |
//! | `recall ask "<query>" [--index]` | Answer a question; `--index` indexes first |
//! | `recall serve http [--bind ADDR]` | Start the HTTP tool server |
//! | `recall serve mcp` | Start the MCP server on stdio |
//!
//! The index lives in memory, so `index` on its own only reports what would
//! be indexed in this process. Use `ask --index` for a one-shot question or
//! one of the servers for a long-lived index.
//!
//! ## Examples
//!
//! ```bash
//! recall --config ./config/recall.toml channels
//! recall ask "when is the release?" --index --channel C024BE91L
//! recall serve mcp
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chat_recall::config::{self, Config};
use chat_recall::harness::Harness;
use chat_recall::{logging, mcp, server};

const DEFAULT_CONFIG_PATH: &str = "./config/recall.toml";

/// Chat Recall: retrieval-augmented answers over chat history.
#[derive(Parser)]
#[command(name = "recall", version, about)]
struct Cli {
    /// Path to the TOML config. Without it, `./config/recall.toml` is used
    /// if present, otherwise built-in defaults (every provider disabled).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List channels visible to the configured source.
    Channels,

    /// Fetch and index messages.
    Index {
        /// Index only this channel id.
        #[arg(long)]
        channel: Option<String>,

        /// Messages to fetch per channel (default: `[source].default_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the indexed messages.
    Ask {
        query: String,

        /// Index the source before answering.
        #[arg(long)]
        index: bool,

        /// With `--index`, index only this channel id.
        #[arg(long)]
        channel: Option<String>,

        /// With `--index`, messages to fetch per channel.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start a tool server.
    Serve {
        #[command(subcommand)]
        target: ServeTarget,
    },
}

#[derive(Subcommand)]
enum ServeTarget {
    /// JSON HTTP API (`/tools/list`, `/tools/{name}`, `/health`).
    Http {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// MCP over stdin/stdout.
    Mcp,
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = resolve_config(cli.config.as_deref())?;
    logging::init(&cfg.logging);
    let bind = cfg.server.bind.clone();
    let harness = Arc::new(Harness::from_config(cfg)?);

    match cli.command {
        Commands::Channels => {
            let channels = harness.list_channels().await;
            if channels.is_empty() {
                println!("No channels found.");
            }
            for channel in channels {
                match channel.name {
                    Some(name) => println!("{:<16} #{}", channel.id, name),
                    None => println!("{}", channel.id),
                }
            }
        }
        Commands::Index { channel, limit } => {
            println!("{}", harness.index_conversations(channel, limit).await);
        }
        Commands::Ask {
            query,
            index,
            channel,
            limit,
        } => {
            if index {
                println!("{}", harness.index_conversations(channel, limit).await);
            }
            println!("{}", harness.search_conversations(&query).await.text);
        }
        Commands::Serve { target } => match target {
            ServeTarget::Http { bind: override_bind } => {
                server::run_server(harness, override_bind.as_deref().unwrap_or(&bind)).await?;
            }
            ServeTarget::Mcp => {
                mcp::run_stdio(harness).await?;
            }
        },
    }

    Ok(())
}
