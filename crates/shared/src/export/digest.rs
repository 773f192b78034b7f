use regex::Regex;
use std::sync::OnceLock;

use crate::markup::strip_bold;
use crate::models::Article;

pub const DEFAULT_MAX_ITEMS: usize = 5;

fn blank_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"))
}

/// Plain-text digest of the first few articles, used as card input.
pub struct DigestFormatter;

impl DigestFormatter {
    /// `"{nn} {title}\n{content}"` blocks separated by one blank line.
    pub fn render(articles: &[Article], max_items: usize) -> String {
        articles
            .iter()
            .take(max_items)
            .enumerate()
            .map(|(index, article)| {
                let body = Self::clean(&article.content);
                if body.is_empty() {
                    format!("{:02} {}", index + 1, article.title)
                } else {
                    format!("{:02} {}\n{}", index + 1, article.title, body)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn clean(content: &str) -> String {
        let plain = strip_bold(content);
        blank_runs()
            .replace_all(&plain, "\n\n")
            .trim()
            .to_string()
    }
}
