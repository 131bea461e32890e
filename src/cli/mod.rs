//! Command line interface.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use helpers::CredentialArgs;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Crawl an authenticated portal into a searchable knowledge base")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the portal and save the session for later runs
    Login {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Crawl the portal and ingest pages and media into the knowledge base
    Crawl {
        /// Seed URL (defaults to portal.base_url)
        seed: Option<String>,

        /// Maximum link depth from the seed
        #[arg(long)]
        depth: Option<u32>,

        /// Maximum number of pages to visit
        #[arg(long)]
        pages: Option<usize>,

        /// Topic used to prioritise matching pages
        #[arg(short, long)]
        topic: Option<String>,

        /// Index only pages matching the topic
        #[arg(long, requires = "topic")]
        focused: bool,

        /// Skip transcription of audio and video
        #[arg(long)]
        no_transcribe: bool,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Transcribe one media URL using the saved session
    Transcribe {
        /// Media URL
        url: String,

        /// MIME type (guessed from the URL when omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Also index the transcript in the knowledge base
        #[arg(long)]
        index: bool,
    },

    /// Search the knowledge base
    Search {
        /// Search query
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long, default_value = "5")]
        limit: usize,
    },

    /// Show knowledge base statistics
    Stats,
}

/// Parse arguments, load settings and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Login { credentials } => {
            commands::login::cmd_login(&settings, &config, &credentials).await
        }
        Commands::Crawl {
            seed,
            depth,
            pages,
            topic,
            focused,
            no_transcribe,
            credentials,
        } => {
            let args = commands::crawl::CrawlArgs {
                seed,
                depth,
                pages,
                topic,
                focused,
                transcribe: !no_transcribe,
            };
            commands::crawl::cmd_crawl(&settings, &config, args, &credentials).await
        }
        Commands::Transcribe { url, mime, index } => {
            commands::transcribe::cmd_transcribe(&settings, &config, &url, mime.as_deref(), index)
                .await
        }
        Commands::Search { query, limit } => {
            commands::knowledge::cmd_search(&settings, &query, limit).await
        }
        Commands::Stats => commands::knowledge::cmd_stats(&settings).await,
    }
}
