use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use shared::{
    BackendClient, ChatCompletionsGateway, ChatGateway, Config, DateSelection, IngestEvent,
    Ingestor, ReviewStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fetch-news")]
#[command(about = "Fetch daily legal-tech news, classify and highlight it, and add it to the review store")]
struct Args {
    /// Single date to fetch (YYYY-MM-DD). Defaults to today
    #[arg(short, long, conflicts_with_all = ["start", "end"])]
    date: Option<NaiveDate>,

    /// First date of a range (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last date of a range (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Store items without classification or highlighting
    #[arg(long)]
    no_ai: bool,

    /// Log the raw backend payload
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,shared=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_env()?;
    let today = Local::now().date_naive();
    let selection = DateSelection::from_args(args.date, args.start, args.end, today)?;

    match selection {
        DateSelection::Single(date) => println!("\n📅 Fetching news for {}", date),
        DateSelection::Range { start, end } => {
            println!("\n📅 Fetching news from {} to {}", start, end)
        }
    }

    let source = BackendClient::from_config(&config)?;
    let gateway = if args.no_ai {
        println!("⚠ AI disabled: items are stored as recommend without highlighting");
        None
    } else {
        Some(ChatCompletionsGateway::from_config(&config)?)
    };

    let store_path = config.store_path();
    shared::io::ensure_dir(&config.data_dir)?;
    let mut store = ReviewStore::open(store_path.clone())
        .with_context(|| format!("Failed to open review store {}", store_path.display()))?;
    println!("📂 Review store: {} ({} articles)", store_path.display(), store.len());

    let ingestor = Ingestor::new(&source, gateway.as_ref().map(|g| g as &dyn ChatGateway));
    let report = ingestor
        .ingest_with_progress(&mut store, selection, print_event)
        .await
        .context("Failed to save fetched news")?;

    println!();
    if report.fetched == 0 {
        println!("No news returned for the selected date(s).");
    } else if report.no_new_data() {
        println!(
            "✓ No new data: all {} fetched item(s) were already in the store",
            report.fetched
        );
    } else {
        println!(
            "✅ Added {} new article(s) from {} day(s). Store now holds {} articles.",
            report.new_count, report.dates, report.total_count
        );
        println!("   Review them with: review-desk");
    }

    Ok(())
}

fn print_event(event: &IngestEvent) {
    match event {
        IngestEvent::DayFetched { date, count } => {
            println!("\n📰 {}: {} item(s) from backend", date, count);
        }
        IngestEvent::Duplicate { title } => {
            println!("  ↷ Already stored: {}", title);
        }
        IngestEvent::Processed {
            index,
            total,
            title,
            tier,
            reason,
        } => {
            println!("  [{}/{}] {} → {}", index, total, title, tier);
            if !reason.is_empty() {
                println!("        {}", reason);
            }
        }
        IngestEvent::DaySaved { date, added } => {
            println!("  💾 Saved {} new article(s) for {}", added, date);
        }
    }
}
