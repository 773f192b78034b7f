use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::CardSummary;
use crate::gateway::{ChatGateway, Completion};

const MAX_ATTEMPTS: usize = 2;
const MAX_TOKENS: u32 = 1500;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

const PROMPT: &str = r#"You are the editor of a legal-tech news card. Read the news below and
summarize it for a compact image card.

Return ONLY a JSON object, without markdown fences or any other text, using
exactly these keys:
{
  "title": "a short headline, at most 20 characters",
  "summary": "one or two sentences covering the core event",
  "bullets": ["two to four key points, each one short sentence"],
  "key_data": ["numbers, amounts or dates worth highlighting, may be empty"]
}

Write in the same language as the news. Do not use markdown markers.

News:
"#;

fn bullet_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\*\-\d\.]+\s*").expect("static regex"))
}

/// Second-pass summarizer producing the structured data for one card entry.
pub struct CardSummarizer<'a> {
    gateway: &'a dyn ChatGateway,
    retry_delay: Duration,
}

impl<'a> CardSummarizer<'a> {
    pub fn new(gateway: &'a dyn ChatGateway) -> Self {
        Self {
            gateway,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Summarizes one article. `None` means this item is skipped: the model
    /// answered with nothing, or every attempt failed or returned bad JSON.
    pub async fn summarize(&self, raw_text: &str) -> Option<CardSummary> {
        let prompt = format!("{}{}", PROMPT, raw_text.trim());

        for attempt in 1..=MAX_ATTEMPTS {
            match self.gateway.complete(&prompt, MAX_TOKENS).await {
                Completion::Text(text) => match parse_summary(&text) {
                    Ok(summary) => return Some(summary),
                    Err(e) => {
                        warn!(attempt, "Card summary was not valid JSON: {}", e);
                        debug!("Raw card response: {}", text);
                    }
                },
                Completion::Empty => {
                    warn!("Card summary came back empty, skipping item");
                    return None;
                }
                Completion::Failed(e) => {
                    warn!(attempt, "Card summary request failed: {}", e);
                }
            }

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        None
    }
}

/// Convenience wrapper with the default retry delay.
pub async fn summarize_for_card(gateway: &dyn ChatGateway, raw_text: &str) -> Option<CardSummary> {
    CardSummarizer::new(gateway).summarize(raw_text).await
}

/// Decodes a model response into a cleaned summary.
pub fn parse_summary(text: &str) -> Result<CardSummary, serde_json::Error> {
    let summary: CardSummary = serde_json::from_str(&clean_json_text(text))?;
    Ok(clean_summary(summary))
}

/// Strips code fences and invisible characters and keeps the outermost
/// `{...}` object.
pub fn clean_json_text(text: &str) -> String {
    let text = text
        .replace("```json", "")
        .replace("```", "")
        .replace(['\u{200b}', '\u{00ad}'], "");

    let body = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.as_str(),
    };

    body.replace(['\n', '\t'], "")
}

/// Removes leftover markdown from decoded values.
pub fn clean_summary(summary: CardSummary) -> CardSummary {
    let strip = |s: &str| s.replace("**", "").replace("##", "").trim().to_string();

    CardSummary {
        title: strip(&summary.title),
        summary: strip(&summary.summary),
        bullets: summary
            .bullets
            .iter()
            .map(|b| {
                bullet_prefix()
                    .replace(b.trim(), "")
                    .replace("**", "")
                    .trim()
                    .to_string()
            })
            .filter(|b| !b.is_empty())
            .collect(),
        key_data: summary
            .key_data
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    }
}
