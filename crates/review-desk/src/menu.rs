use anyhow::Result;
use shared::export::digest::DEFAULT_MAX_ITEMS;
use shared::models::{Article, ReviewStatus, StatusFilter, Tier};
use shared::{Config, ReviewStore};
use std::io::{self as stdio, Write};

use crate::commands::{self, ExportFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Main,
    Review,
    Order,
    Publish,
    Quit,
}

/// What the operator is looking at. Handlers get it explicitly and decide
/// the next panel by updating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub volume: String,
    pub panel: Panel,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            volume: String::new(),
            panel: Panel::Main,
        }
    }
}

pub async fn run(store: &mut ReviewStore, config: &Config) -> Result<()> {
    let mut view = SessionView::default();

    while view.panel != Panel::Quit {
        let outcome = match view.panel {
            Panel::Main => main_panel(store, &mut view),
            Panel::Review => review_panel(store, &mut view),
            Panel::Order => order_panel(store, &mut view),
            Panel::Publish => publish_panel(store, config, &mut view).await,
            Panel::Quit => Ok(()),
        };

        // Errors are shown and the session carries on
        if let Err(e) = outcome {
            println!("✗ {:#}", e);
        }
    }

    println!("👋 Bye");
    Ok(())
}

fn main_panel(store: &ReviewStore, view: &mut SessionView) -> Result<()> {
    let pending = store.list(StatusFilter::Pending).len();
    let kept = store.list(StatusFilter::Keep).len();

    println!("\n=== Review desk ({} articles: {} pending, {} kept) ===", store.len(), pending, kept);
    if !view.volume.is_empty() {
        println!("Volume: {}", view.volume);
    }
    println!("  1) Review pending articles");
    println!("  2) Arrange publish order");
    println!("  3) Publish and export");
    println!("  q) Quit");

    view.panel = match prompt("\nChoice: ")?.as_deref() {
        Some("1") => Panel::Review,
        Some("2") => Panel::Order,
        Some("3") => Panel::Publish,
        Some("q") | None => Panel::Quit,
        Some(other) => {
            println!("Unknown choice: {}", other);
            Panel::Main
        }
    };
    Ok(())
}

fn review_panel(store: &mut ReviewStore, view: &mut SessionView) -> Result<()> {
    let pending: Vec<Article> = store
        .list(StatusFilter::Pending)
        .into_iter()
        .cloned()
        .collect();

    let Some(article) = pending.first() else {
        println!("\n✓ No pending articles left");
        view.panel = Panel::Main;
        return Ok(());
    };

    println!("\n--- {} pending ---", pending.len());
    println!("{}  [{}] {}", article.date, article.ai_tier, article.title);
    if !article.ai_reason.is_empty() {
        println!("AI: {}", article.ai_reason);
    }
    println!("{}\n", shared::markup::strip_bold(&article.content).trim());
    println!("  k) keep   d) discard   t) change tier   b) back to menu");

    match prompt("Decision: ")?.as_deref() {
        Some("k") => commands::set_status(store, &article.title, ReviewStatus::Keep)?,
        Some("d") => commands::set_status(store, &article.title, ReviewStatus::Discard)?,
        Some("t") => {
            if let Some(tier) = prompt_tier()? {
                commands::set_tier(store, &article.title, tier)?;
            }
        }
        Some("b") => view.panel = Panel::Main,
        None => view.panel = Panel::Quit,
        Some(other) => println!("Unknown choice: {}", other),
    }
    Ok(())
}

fn order_panel(store: &mut ReviewStore, view: &mut SessionView) -> Result<()> {
    let kept = store.kept_in_publish_order();
    println!("\n--- Publish order ---");
    if kept.is_empty() {
        println!("Nothing kept yet.");
        view.panel = Panel::Main;
        return Ok(());
    }
    for (index, article) in kept.iter().enumerate() {
        commands::print_row(index + 1, article);
    }

    println!("\nEnter \"<number> <order>\" to pin, \"<number> -\" to clear, or b to go back.");
    let Some(input) = prompt("Order: ")? else {
        view.panel = Panel::Quit;
        return Ok(());
    };
    if input == "b" || input.is_empty() {
        view.panel = Panel::Main;
        return Ok(());
    }

    let mut parts = input.split_whitespace();
    let (Some(number), Some(order)) = (parts.next(), parts.next()) else {
        println!("Expected two values, e.g. \"3 1\"");
        return Ok(());
    };
    let article = number
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| kept.get(i));
    let Some(article) = article else {
        println!("No article numbered {}", number);
        return Ok(());
    };

    let order = if order == "-" {
        None
    } else {
        match order.parse::<u32>() {
            Ok(order) => Some(order),
            Err(_) => {
                println!("Order must be a positive integer");
                return Ok(());
            }
        }
    };
    commands::set_order(store, &article.title, order)
}

async fn publish_panel(
    store: &mut ReviewStore,
    config: &Config,
    view: &mut SessionView,
) -> Result<()> {
    println!("\n--- Publish (volume: {}) ---", display_volume(&view.volume));
    println!("  v) Set volume");
    println!("  p) Preview");
    println!("  h) Export newsletter HTML");
    println!("  t) Export text digest");
    println!("  j) Export document JSON");
    println!("  f) Publish document");
    println!("  a) Archive volume");
    println!("  c) Clean up discarded articles");
    println!("  b) Back");

    let Some(choice) = prompt("Choice: ")? else {
        view.panel = Panel::Quit;
        return Ok(());
    };

    match choice.as_str() {
        "v" => {
            if let Some(volume) = prompt("Volume: ")? {
                view.volume = shared::store::validate_volume(&volume)?;
            }
        }
        "p" => commands::preview(store, &view.volume),
        "h" => {
            commands::export(store, config, ExportFormat::Html, &view.volume, DEFAULT_MAX_ITEMS)?;
        }
        "t" => {
            commands::export(store, config, ExportFormat::Text, &view.volume, DEFAULT_MAX_ITEMS)?;
        }
        "j" => {
            commands::export(store, config, ExportFormat::DocJson, &view.volume, DEFAULT_MAX_ITEMS)?;
        }
        "f" => {
            commands::publish(store, config, &view.volume).await?;
        }
        "a" => {
            let volume = shared::store::validate_volume(&view.volume)?;
            if confirm(&format!("Archive vol.{} and clear kept/discarded rows?", volume))? {
                commands::archive(store, &volume)?;
            }
        }
        "c" => {
            if confirm("Delete all discarded articles without a snapshot?")? {
                commands::purge(store)?;
            }
        }
        "b" => view.panel = Panel::Main,
        other => println!("Unknown choice: {}", other),
    }
    Ok(())
}

fn prompt_tier() -> Result<Option<Tier>> {
    for (index, tier) in Tier::ALL.iter().enumerate() {
        println!("  {}) {}", index + 1, tier);
    }
    let Some(choice) = prompt("Tier: ")? else {
        return Ok(None);
    };
    Ok(choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| Tier::ALL.get(i).copied())
        .or_else(|| Tier::parse(&choice)))
}

fn display_volume(volume: &str) -> &str {
    if volume.is_empty() {
        "not set"
    } else {
        volume
    }
}

/// Reads one trimmed line. `None` on end of input.
fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    stdio::stdout().flush()?;

    let mut input = String::new();
    if stdio::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.as_deref(), Some("y") | Some("Y") | Some("yes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_on_main_without_volume() {
        let view = SessionView::default();
        assert_eq!(view.panel, Panel::Main);
        assert!(view.volume.is_empty());
        assert_eq!(display_volume(&view.volume), "not set");
    }
}
