mod commands;
mod menu;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::export::digest::DEFAULT_MAX_ITEMS;
use shared::models::{ReviewStatus, StatusFilter, Tier};
use shared::{Config, ReviewStore};
use tracing_subscriber::EnvFilter;

use commands::ExportFormat;

#[derive(Parser)]
#[command(name = "review-desk")]
#[command(about = "Review, order, export and publish collected legal-tech news")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List articles in the store
    List {
        /// all, pending, keep, discard or published
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,
    },
    /// Set an article's review status (pending, keep or discard)
    SetStatus { title: String, status: ReviewStatus },
    /// Override an article's tier (strong-recommend, recommend, neutral or not-recommended)
    SetTier { title: String, tier: Tier },
    /// Pin an article's publish order, or clear it when no order is given
    SetOrder { title: String, order: Option<u32> },
    /// Delete every discarded article
    Purge,
    /// Preview the kept articles in publish order
    Preview {
        #[arg(short, long, default_value = "")]
        volume: String,
    },
    /// Export the kept articles
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        #[arg(short, long, default_value = "")]
        volume: String,
        /// Number of articles in the text digest
        #[arg(short, long, default_value_t = DEFAULT_MAX_ITEMS)]
        max: usize,
    },
    /// Publish the kept articles as a collaborative document
    Publish {
        #[arg(short, long)]
        volume: String,
    },
    /// Snapshot the volume and clear kept and discarded rows
    Archive {
        #[arg(short, long)]
        volume: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Verify the document service credentials
    CheckDocs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let store_path = config.store_path();
    let mut store = ReviewStore::open(store_path.clone())
        .with_context(|| format!("Failed to open review store {}", store_path.display()))?;

    let Some(command) = args.command else {
        return menu::run(&mut store, &config).await;
    };

    match command {
        Command::List { status } => commands::print_list(&store, status),
        Command::SetStatus { title, status } => commands::set_status(&mut store, &title, status)?,
        Command::SetTier { title, tier } => commands::set_tier(&mut store, &title, tier)?,
        Command::SetOrder { title, order } => commands::set_order(&mut store, &title, order)?,
        Command::Purge => commands::purge(&mut store)?,
        Command::Preview { volume } => commands::preview(&store, &volume),
        Command::Export {
            format,
            volume,
            max,
        } => {
            commands::export(&store, &config, format, &volume, max)?;
        }
        Command::Publish { volume } => {
            commands::publish(&store, &config, &volume).await?;
        }
        Command::Archive { volume, yes } => {
            if yes || menu::confirm(&format!("Archive vol.{} and clear kept/discarded rows?", volume.trim()))? {
                commands::archive(&mut store, &volume)?;
            } else {
                println!("Archive cancelled.");
            }
        }
        Command::CheckDocs => commands::check_docs(&config).await?,
    }

    Ok(())
}
