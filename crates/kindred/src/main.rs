// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kindred - conversational memory for companion agents.
//!
//! This binary operates the memory store: seeding it from data files,
//! inspecting and editing long-term memory, running relevance searches,
//! and checking the environment.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod memories;
mod search;
mod seed;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kindred_config::model::KindredConfig;

/// Kindred - conversational memory for companion agents.
#[derive(Parser, Debug)]
#[command(name = "kindred", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Seed empty tables from the JSON files in the data directory.
    Seed {
        /// Data directory (defaults to storage.data_dir).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Import every .txt file in a directory as long-term memories.
    Import {
        /// Directory to scan (defaults to storage.data_dir).
        #[arg(long)]
        dir: Option<PathBuf>,
        /// User to import for (defaults to agent.seed_user_id).
        #[arg(long)]
        user: Option<String>,
    },
    /// List a user's long-term memories.
    Memories {
        user: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List a user's traits.
    Traits { user: String },
    /// Store a memory for a user without going through the model.
    Remember {
        user: String,
        /// What to remember.
        summary: String,
        /// Memory type (defaults to "manual").
        #[arg(long = "type")]
        kind: Option<String>,
        /// Tag to attach; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Keyword recall over a user's long-term memories.
    Recall {
        user: String,
        query: String,
        /// Maximum results (defaults to recall.keyword_recall_limit).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Relevance search over context blocks and archival records.
    Search {
        query: String,
    },
    /// Search past conversations stored in a JSON file.
    Conversations {
        /// File holding an array of `{title, messages: [{role, text}]}`.
        #[arg(long)]
        file: PathBuf,
        query: String,
    },
    /// Run diagnostic checks.
    Doctor {
        /// Run intensive checks as well.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => kindred_config::load_and_validate_path(path),
        None => kindred_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            kindred_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);
    kindred_memory::metrics::register_metrics();

    if let Err(e) = run(cli, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: KindredConfig) -> Result<(), kindred_core::KindredError> {
    match cli.command {
        Some(Commands::Seed { dir }) => seed::run_seed(&config, dir).await,
        Some(Commands::Import { dir, user }) => seed::run_import(&config, dir, user).await,
        Some(Commands::Memories { user, json }) => {
            memories::run_memories(&config, &user, json).await
        }
        Some(Commands::Traits { user }) => memories::run_traits(&config, &user).await,
        Some(Commands::Remember {
            user,
            summary,
            kind,
            tags,
        }) => memories::run_remember(&config, &user, summary, kind, tags).await,
        Some(Commands::Recall { user, query, limit }) => {
            memories::run_recall(&config, &user, &query, limit).await
        }
        Some(Commands::Search { query }) => search::run_search(&config, &query).await,
        Some(Commands::Conversations { file, query }) => {
            search::run_conversations(&config, &file, &query).await
        }
        Some(Commands::Doctor { deep, plain }) => {
            doctor::run_doctor(&config, cli.config.as_deref(), deep, plain).await
        }
        None => {
            println!("kindred: use --help for available commands");
            Ok(())
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kindred={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
