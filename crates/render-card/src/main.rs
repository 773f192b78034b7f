use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use shared::card::{
    self, CardContext, CardImages, CardSummarizer, ChromeScreenshotter, Padding, DEFAULT_OUTPUT,
    DEFAULT_TEMPLATE, DRAFT_FILENAME,
};
use shared::export::digest::DEFAULT_MAX_ITEMS;
use shared::{ChatCompletionsGateway, Config, ReviewStore};
use std::fs;
use std::io::{self as stdio, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render-card")]
#[command(about = "Summarize the digest into a daily news card image")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize articles into an editable draft file
    Draft(DraftArgs),
    /// Render a draft file into a PNG card
    Render(RenderArgs),
    /// Draft, wait for edits, then render
    Run {
        #[command(flatten)]
        draft: DraftArgs,
        #[command(flatten)]
        render: RenderOptions,
    },
}

#[derive(ClapArgs)]
struct DraftArgs {
    /// Text file with one article per blank-line separated block
    #[arg(short, long, conflicts_with = "from_store")]
    input: Option<PathBuf>,

    /// Use the kept articles from the review store
    #[arg(long)]
    from_store: bool,

    /// Number of store articles to use
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    max: usize,

    /// Draft file to write
    #[arg(long)]
    draft: Option<PathBuf>,
}

#[derive(ClapArgs)]
struct RenderArgs {
    /// Draft file to read
    #[arg(long)]
    data: Option<PathBuf>,

    #[command(flatten)]
    options: RenderOptions,
}

#[derive(ClapArgs)]
struct RenderOptions {
    /// HTML template with {{ date_str }}, {{ weekday_str }}, {{ news_items }}, {{ qr_code }},
    /// {{ scale_icon }} and {{ calendar_icon }}
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Image file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Date text shown on the card. Defaults to today
    #[arg(long)]
    date: Option<String>,

    /// Weekday text shown on the card. Defaults to today's
    #[arg(long)]
    weekday: Option<String>,

    #[arg(long, default_value_t = card::screenshot::DEFAULT_PADDING_TOP)]
    padding_top: u32,

    #[arg(long, default_value_t = card::screenshot::DEFAULT_PADDING_BOTTOM)]
    padding_bottom: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Draft(draft) => {
            let path = run_draft(&config, &draft).await?;
            println!("\n✏️  Edit {} if needed, then run: render-card render", path.display());
        }
        Command::Render(render) => {
            let data = render
                .data
                .unwrap_or_else(|| default_draft_path(&config));
            run_render(&config, &data, &render.options).await?;
        }
        Command::Run { draft, render } => {
            let path = run_draft(&config, &draft).await?;
            println!("\n✏️  Edit {} now if needed.", path.display());
            print!("Press Enter when the draft is ready to render...");
            stdio::stdout().flush()?;
            let mut line = String::new();
            stdio::stdin().read_line(&mut line)?;
            run_render(&config, &path, &render).await?;
        }
    }

    Ok(())
}

fn default_draft_path(config: &Config) -> PathBuf {
    config.card_dir().join(DRAFT_FILENAME)
}

async fn run_draft(config: &Config, args: &DraftArgs) -> Result<PathBuf> {
    let texts = if let Some(input) = &args.input {
        println!("📖 Reading {}", input.display());
        let text = fs::read_to_string(input)
            .with_context(|| format!("Failed to read input file: {}", input.display()))?;
        card::split_articles(&text)
    } else if args.from_store {
        let store = ReviewStore::open(config.store_path())?;
        println!("📂 Using kept articles from {}", store.path().display());
        card::texts_from_articles(&store.kept_in_publish_order(), args.max)
    } else {
        anyhow::bail!("Choose an input: --input <FILE> or --from-store");
    };

    if texts.is_empty() {
        anyhow::bail!("No articles to summarize.");
    }

    println!("\n🤖 Summarizing {} article(s) for the card...", texts.len());
    let gateway = ChatCompletionsGateway::from_config(config)?;
    let summarizer = CardSummarizer::new(&gateway);
    let path = args
        .draft
        .clone()
        .unwrap_or_else(|| default_draft_path(config));

    let outcome = card::produce_draft(&summarizer, &texts, &path).await?;
    println!(
        "✓ Draft saved to {} ({} item(s))",
        outcome.path.display(),
        outcome.written
    );
    if outcome.skipped > 0 {
        println!("⚠ Skipped {} item(s) the model could not summarize", outcome.skipped);
    }

    Ok(outcome.path)
}

async fn run_render(config: &Config, data: &Path, options: &RenderOptions) -> Result<()> {
    println!("📖 Loading draft {}", data.display());
    let items = card::finalize_from_draft(data)?;

    let template_html = match &options.template {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let today: NaiveDate = Local::now().date_naive();
    let context = CardContext::for_date(
        today,
        options.date.as_deref(),
        options.weekday.as_deref(),
        CardImages::load(&config.card_dir()),
    );

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let padding = Padding {
        top: options.padding_top,
        bottom: options.padding_bottom,
    };

    println!("\n📸 Rendering {} item(s)...", items.len());
    card::render_card(
        &items,
        &template_html,
        &context,
        &ChromeScreenshotter::default(),
        padding,
        &output,
    )
    .await?;

    println!("✅ Card saved to {}", output.display());
    Ok(())
}
