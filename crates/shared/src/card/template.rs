use base64::{engine::general_purpose, Engine as _};
use chrono::{Datelike, NaiveDate, Weekday};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::CardSummary;
use crate::export::escape_html;

/// Built-in card layout. User templates use the same placeholders.
pub const DEFAULT_TEMPLATE: &str = include_str!("card_template.html");

/// 1x1 transparent gif used when an image is missing.
pub const PLACEHOLDER_IMAGE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

const WEEKDAYS: [&str; 7] = [
    "星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日",
];

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static regex"))
}

/// Images embedded in the card as data URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardImages {
    pub qr_code: String,
    pub scale_icon: String,
    pub calendar_icon: String,
}

impl CardImages {
    /// Looks each image up in the working directory, `card_assets/`, then
    /// `card_dir`. Missing images fall back to the transparent placeholder.
    pub fn load(card_dir: &Path) -> Self {
        Self {
            qr_code: image_data_uri(&asset_candidates(card_dir, "qrcode.png")),
            scale_icon: image_data_uri(&asset_candidates(card_dir, "scale_icon.png")),
            calendar_icon: image_data_uri(&asset_candidates(card_dir, "calendar_icon.png")),
        }
    }

    pub fn placeholders() -> Self {
        Self {
            qr_code: PLACEHOLDER_IMAGE.to_string(),
            scale_icon: PLACEHOLDER_IMAGE.to_string(),
            calendar_icon: PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Values substituted into a card template.
#[derive(Debug, Clone)]
pub struct CardContext {
    pub date_str: String,
    pub weekday_str: String,
    pub images: CardImages,
}

impl CardContext {
    /// Labels for `date`, with optional overrides for the date and weekday
    /// text.
    pub fn for_date(
        date: NaiveDate,
        date_str: Option<&str>,
        weekday_str: Option<&str>,
        images: CardImages,
    ) -> Self {
        Self {
            date_str: date_str
                .map(str::to_string)
                .unwrap_or_else(|| date_label(date)),
            weekday_str: weekday_str
                .map(str::to_string)
                .unwrap_or_else(|| weekday_label(date.weekday()).to_string()),
            images,
        }
    }
}

/// `01月09日` style label.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%m月%d日").to_string()
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    WEEKDAYS[weekday.num_days_from_monday() as usize]
}

/// Fills `{{ name }}` placeholders. Unknown names are left as they are.
pub fn render(template: &str, items: &[CardSummary], context: &CardContext) -> String {
    let news_items = news_items_html(items);

    placeholder()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "date_str" => escape_html(&context.date_str),
            "weekday_str" => escape_html(&context.weekday_str),
            "news_items" => news_items.clone(),
            "qr_code" | "qr_code_path" => context.images.qr_code.clone(),
            "scale_icon" => context.images.scale_icon.clone(),
            "calendar_icon" => context.images.calendar_icon.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// One `news-section` block per summary.
pub fn news_items_html(items: &[CardSummary]) -> String {
    let mut html = String::new();

    for item in items {
        html.push_str("            <div class=\"news-section\">\n");
        html.push_str(&format!(
            "                <div class=\"news-title\">{}</div>\n",
            escape_html(&item.title)
        ));
        if !item.summary.is_empty() {
            html.push_str(&format!(
                "                <div class=\"news-summary\">{}</div>\n",
                escape_html(&item.summary)
            ));
        }
        if !item.key_data.is_empty() {
            let data: Vec<String> = item.key_data.iter().map(|d| escape_html(d)).collect();
            html.push_str(&format!(
                "                <div class=\"key-data\">{}</div>\n",
                data.join(" · ")
            ));
        }
        if !item.bullets.is_empty() {
            html.push_str("                <ul class=\"bullet-points\">\n");
            for bullet in &item.bullets {
                html.push_str(&format!("                    <li>{}</li>\n", escape_html(bullet)));
            }
            html.push_str("                </ul>\n");
        }
        html.push_str("            </div>\n");
    }

    html
}

/// The first readable image among `candidates` as a PNG data URI, or the
/// transparent placeholder.
pub fn image_data_uri(candidates: &[PathBuf]) -> String {
    for path in candidates {
        match fs::read(path) {
            Ok(bytes) => {
                debug!("Embedding image {}", path.display());
                return format!(
                    "data:image/png;base64,{}",
                    general_purpose::STANDARD.encode(bytes)
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => warn!("Could not read image {}: {}", path.display(), e),
        }
    }
    PLACEHOLDER_IMAGE.to_string()
}

/// Default locations of a card asset: the working directory, then the card
/// assets directory, then the data directory's card folder.
pub fn asset_candidates(card_dir: &Path, filename: &str) -> Vec<PathBuf> {
    vec![
        PathBuf::from(filename),
        PathBuf::from("card_assets").join(filename),
        card_dir.join(filename),
    ]
}
