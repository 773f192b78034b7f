use anyhow::{Context, Result};
use chrono::Local;
use shared::export::{self, DigestFormatter, DocumentBuilder, NewsletterFormatter};
use shared::models::{Article, ReviewStatus, StatusFilter, Tier};
use shared::{Config, DocsPublisher, ReviewStore};
use std::path::PathBuf;

/// Export payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Inline-styled newsletter HTML
    Html,
    /// Plain-text digest of the first few articles
    Text,
    /// Document block payload as JSON
    DocJson,
}

pub fn print_list(store: &ReviewStore, filter: StatusFilter) {
    let rows = store.list(filter);
    if rows.is_empty() {
        println!("No articles match.");
        return;
    }

    for (index, article) in rows.iter().enumerate() {
        print_row(index + 1, article);
    }
    println!("\n{} article(s)", rows.len());
}

pub fn print_row(number: usize, article: &Article) {
    let order = article
        .publish_order
        .map(|o| format!("#{}", o))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>3}. [{:<12}] {:<16} {:>4}  {}  {}",
        number,
        article.review.to_string(),
        article.ai_tier.to_string(),
        order,
        article.date,
        article.title
    );
    if !article.ai_reason.is_empty() {
        println!("       {}", article.ai_reason);
    }
}

pub fn set_status(store: &mut ReviewStore, title: &str, status: ReviewStatus) -> Result<()> {
    store.set_status(title, status.clone())?;
    println!("✓ {} → {}", title, status);
    Ok(())
}

pub fn set_tier(store: &mut ReviewStore, title: &str, tier: Tier) -> Result<()> {
    store.set_tier(title, tier)?;
    println!("✓ {} → {}", title, tier);
    Ok(())
}

pub fn set_order(store: &mut ReviewStore, title: &str, order: Option<u32>) -> Result<()> {
    store.set_order(title, order)?;
    match order {
        Some(order) => println!("✓ {} → order {}", title, order),
        None => println!("✓ {} → order cleared", title),
    }
    Ok(())
}

pub fn purge(store: &mut ReviewStore) -> Result<()> {
    let removed = store.purge_discarded()?;
    println!("🗑  Removed {} discarded article(s)", removed);
    Ok(())
}

pub fn preview(store: &ReviewStore, volume: &str) {
    let kept = store.kept_in_publish_order();
    if kept.is_empty() {
        println!("Nothing kept for publishing yet.");
        return;
    }
    println!("{}", export::preview(&kept, volume));
}

/// Renders the kept articles and writes them under `<data dir>/exports`.
pub fn export(
    store: &ReviewStore,
    config: &Config,
    format: ExportFormat,
    volume: &str,
    max_items: usize,
) -> Result<PathBuf> {
    let kept = require_kept(store)?;
    let tag = export_tag(volume)?;

    let (content, filename) = match format {
        ExportFormat::Html => (
            NewsletterFormatter::render(&kept, volume),
            format!("newsletter_{}.html", tag),
        ),
        ExportFormat::Text => (
            DigestFormatter::render(&kept, max_items),
            format!("digest_{}.txt", tag),
        ),
        ExportFormat::DocJson => (
            serde_json::to_string_pretty(&DocumentBuilder::build(&kept))
                .context("Failed to serialize document blocks")?,
            format!("document_{}.json", tag),
        ),
    };

    let path = export::save(&content, &config.data_dir.join("exports"), &filename)?;
    let count = match format {
        ExportFormat::Text => kept.len().min(max_items),
        _ => kept.len(),
    };
    println!("✓ Exported {} article(s) to {}", count, path.display());
    Ok(path)
}

pub async fn publish(store: &ReviewStore, config: &Config, volume: &str) -> Result<String> {
    let kept = require_kept(store)?;
    let volume = shared::store::validate_volume(volume)?;
    let title = config.report_title(&volume);

    println!("\n📤 Publishing {} article(s) as \"{}\"...", kept.len(), title);
    let publisher = DocsPublisher::from_config(config)?;
    let (_, url) = publisher
        .publish_report(&volume, &title, &kept)
        .await
        .context("Failed to publish the report document")?;

    println!("✅ Published: {}", url);
    Ok(url)
}

pub fn archive(store: &mut ReviewStore, volume: &str) -> Result<()> {
    let report = store.archive(volume, Local::now().date_naive())?;
    println!(
        "📦 Archived vol.{}: {} published, {} discarded",
        report.volume, report.published, report.discarded
    );
    println!("   {}", report.published_snapshot.display());
    println!("   {}", report.discarded_snapshot.display());
    Ok(())
}

pub async fn check_docs(config: &Config) -> Result<()> {
    println!("🔌 Checking document service credentials...");
    let publisher = DocsPublisher::from_config(config)?;
    publisher
        .check_connection()
        .await
        .context("Could not obtain a document service token")?;
    println!("✓ Document service connection OK");
    Ok(())
}

/// Filename tag: the validated volume, or today's date without one.
fn export_tag(volume: &str) -> Result<String> {
    if volume.trim().is_empty() {
        return Ok(Local::now().format("%Y-%m-%d").to_string());
    }
    let volume = shared::store::validate_volume(volume)?;
    Ok(format!("vol{}", volume))
}

fn require_kept(store: &ReviewStore) -> Result<Vec<Article>> {
    let kept = store.kept_in_publish_order();
    if kept.is_empty() {
        anyhow::bail!("No kept articles. Mark articles as keep before exporting or publishing.");
    }
    Ok(kept)
}
