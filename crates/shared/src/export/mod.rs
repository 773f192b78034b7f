//! Renderers turning the kept, publish-sorted articles into publishable
//! payloads. All of them are pure; `save` is the only one touching disk.

pub mod digest;
pub mod document;
pub mod newsletter;

pub use digest::DigestFormatter;
pub use document::{Block, DocumentBuilder};
pub use newsletter::NewsletterFormatter;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::markup::strip_bold;
use crate::models::Article;

const PREVIEW_CHARS: usize = 200;

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Heading used for a published volume.
pub fn volume_heading(volume: &str) -> String {
    format!("vol.{}｜LawGeek Legal Tech Weekly", volume)
}

/// The article's source name, falling back to a name derived from its URL.
pub fn source_name(article: &Article) -> String {
    let source = article.source.trim();
    if !source.is_empty() {
        return source.to_string();
    }
    if article.url.trim().is_empty() {
        return String::new();
    }
    source_from_url(&article.url)
}

fn source_from_url(link: &str) -> String {
    const KNOWN: [(&str, &str); 8] = [
        ("mp.weixin.qq.com", "WeChat"),
        ("weibo.com", "Weibo"),
        ("weibo.cn", "Weibo"),
        ("twitter.com", "Twitter/X"),
        ("x.com", "Twitter/X"),
        ("reddit.com", "Reddit"),
        ("ft.com", "Financial Times"),
        ("github.com", "GitHub"),
    ];

    let Some(host) = url::Url::parse(link.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    else {
        return "Link".to_string();
    };

    KNOWN
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
        .map(|(_, name)| name.to_string())
        .unwrap_or(host)
}

/// A quick text preview of the publication order.
pub fn preview(articles: &[Article], volume: &str) -> String {
    let mut out = String::new();

    if !volume.trim().is_empty() {
        out.push_str(&format!("### {}\n\n", volume_heading(volume.trim())));
    }

    for (index, article) in articles.iter().enumerate() {
        let order = match article.publish_order {
            Some(order) => format!("order {}", order),
            None => "auto".to_string(),
        };
        out.push_str(&format!(
            "**{:02} {}**  [{}, {}]\n",
            index + 1,
            article.title,
            order,
            article.ai_tier
        ));

        let plain = strip_bold(&article.content);
        let excerpt: String = plain.chars().take(PREVIEW_CHARS).collect();
        out.push_str(excerpt.trim());
        if plain.chars().count() > PREVIEW_CHARS {
            out.push_str("...");
        }
        out.push_str("\n\n");
    }

    out
}

/// Writes an export next to the store data and returns its path.
pub fn save(content: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let filepath = dir.join(filename);
    fs::write(&filepath, content)
        .with_context(|| format!("Failed to write export file {}", filepath.display()))?;

    Ok(filepath)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Article, ReviewStatus, Tier};
    use chrono::NaiveDate;

    pub fn article(title: &str, content: &str) -> Article {
        Article {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            rank: 1,
            score: 80.0,
            title: title.to_string(),
            url: "https://news.example/a".to_string(),
            source: "Legal Daily".to_string(),
            content: content.to_string(),
            ai_tier: Tier::Recommend,
            ai_reason: String::new(),
            review: ReviewStatus::Keep,
            publish_order: None,
        }
    }
}
