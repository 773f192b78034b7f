//! Image card for the daily digest: a second summarization pass, an
//! editable draft file, then template rendering and a screenshot.

pub mod screenshot;
pub mod summarizer;
pub mod template;

pub use screenshot::{ChromeScreenshotter, Padding, Screenshotter, CARD_SELECTOR};
pub use summarizer::{summarize_for_card, CardSummarizer};
pub use template::{CardContext, CardImages, DEFAULT_TEMPLATE};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::markup::strip_bold;
use crate::models::Article;

pub const DRAFT_VERSION: &str = "1.0";
pub const DRAFT_FILENAME: &str = "news_edit_review.json";
pub const DEFAULT_OUTPUT: &str = "daily_news_card.png";

/// Structured summary of one article on the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    #[serde(alias = "main_title")]
    pub title: String,
    #[serde(default, alias = "abstract_summary")]
    pub summary: String,
    #[serde(default, alias = "bullet_points")]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub key_data: Vec<String>,
}

/// The editable checkpoint between summarizing and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDraft {
    pub version: String,
    pub created_at: String,
    pub items: Vec<CardSummary>,
}

impl CardDraft {
    pub fn new(items: Vec<CardSummary>) -> Self {
        Self {
            version: DRAFT_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339(),
            items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DraftOutcome {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: usize,
}

/// Splits a pasted digest into article texts on blank lines.
pub fn split_articles(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Card inputs from the first `max` articles: title plus marker-free body.
pub fn texts_from_articles(articles: &[Article], max: usize) -> Vec<String> {
    articles
        .iter()
        .take(max)
        .map(|article| {
            let body = strip_bold(&article.content);
            let body = body.trim();
            if body.is_empty() {
                article.title.clone()
            } else {
                format!("{}\n{}", article.title, body)
            }
        })
        .collect()
}

/// Summarizes every text in order and writes the draft file. Items the model
/// cannot summarize are skipped; a draft with no items is an error.
pub async fn produce_draft(
    summarizer: &CardSummarizer<'_>,
    texts: &[String],
    path: &Path,
) -> Result<DraftOutcome> {
    let mut items = Vec::new();
    let mut skipped = 0;

    for (index, text) in texts.iter().enumerate() {
        info!("Summarizing card item {}/{}", index + 1, texts.len());
        match summarizer.summarize(text).await {
            Some(summary) => items.push(summary),
            None => skipped += 1,
        }
    }

    if items.is_empty() {
        anyhow::bail!(
            "No card summaries were produced ({} item(s) skipped). Check the LLM settings and try again.",
            skipped
        );
    }

    let written = items.len();
    crate::io::save_draft(&CardDraft::new(items), path)?;

    Ok(DraftOutcome {
        path: path.to_path_buf(),
        written,
        skipped,
    })
}

/// Re-reads the draft after the operator has edited it.
pub fn finalize_from_draft(path: &Path) -> Result<Vec<CardSummary>> {
    Ok(crate::io::load_draft(path)?.items)
}

/// Renders the items into `template` and captures the card element.
pub async fn render_card(
    items: &[CardSummary],
    template_html: &str,
    context: &CardContext,
    screenshotter: &dyn Screenshotter,
    padding: Padding,
    output: &Path,
) -> Result<()> {
    let html = template::render(template_html, items, context);
    screenshotter
        .capture(&html, CARD_SELECTOR, padding, output)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::article;
    use crate::gateway::testing::ScriptedGateway;
    use crate::gateway::Completion;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_split_articles_on_blank_lines() {
        let text = "01 A\nbody a\n\n\n02 B\r\nbody b\r\n\r\n  \n\n03 C";
        assert_eq!(
            split_articles(text),
            vec!["01 A\nbody a", "02 B\nbody b", "03 C"]
        );
    }

    #[test]
    fn test_texts_from_articles_caps_and_strips() {
        let articles = vec![
            article("A", "估值 **10 亿**"),
            article("B", ""),
            article("C", "c"),
        ];
        assert_eq!(texts_from_articles(&articles, 2), vec!["A\n估值 10 亿", "B"]);
    }

    #[tokio::test]
    async fn test_draft_round_trip_with_skips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DRAFT_FILENAME);
        let gateway = ScriptedGateway::new(vec![
            Completion::Text(r#"{"title": "一", "summary": "s", "bullets": [], "key_data": []}"#.into()),
            Completion::Empty,
            Completion::Text(r#"{"main_title": "三", "abstract_summary": "s"}"#.into()),
        ]);
        let summarizer = CardSummarizer::new(&gateway).with_retry_delay(Duration::ZERO);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let outcome = produce_draft(&summarizer, &texts, &path).await.unwrap();
        assert_eq!((outcome.written, outcome.skipped), (2, 1));

        // The operator edits the draft by hand before rendering.
        let edited = fs::read_to_string(&path).unwrap().replace("\"一\"", "\"改\"");
        fs::write(&path, edited).unwrap();

        let items = finalize_from_draft(&path).unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["改", "三"]);
    }

    #[tokio::test]
    async fn test_draft_with_no_items_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DRAFT_FILENAME);
        let gateway = ScriptedGateway::texts(&[]);
        let summarizer = CardSummarizer::new(&gateway).with_retry_delay(Duration::ZERO);

        assert!(produce_draft(&summarizer, &["a".to_string()], &path)
            .await
            .is_err());
        assert!(!path.exists());
    }

    struct RecordingScreenshotter {
        captured: Mutex<Vec<(String, String, Padding)>>,
    }

    #[async_trait]
    impl Screenshotter for RecordingScreenshotter {
        async fn capture(
            &self,
            html: &str,
            selector: &str,
            padding: Padding,
            output: &Path,
        ) -> Result<()> {
            self.captured
                .lock()
                .unwrap()
                .push((html.to_string(), selector.to_string(), padding));
            fs::write(output, b"png")?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_render_card_passes_html_to_screenshotter() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join(DEFAULT_OUTPUT);
        let shooter = RecordingScreenshotter {
            captured: Mutex::new(Vec::new()),
        };
        let items = vec![CardSummary {
            title: "标题".to_string(),
            summary: "摘要".to_string(),
            bullets: vec![],
            key_data: vec![],
        }];
        let context = CardContext {
            date_str: "01月09日".to_string(),
            weekday_str: "星期四".to_string(),
            images: CardImages::placeholders(),
        };
        let padding = Padding { top: 10, bottom: 20 };

        render_card(&items, DEFAULT_TEMPLATE, &context, &shooter, padding, &output)
            .await
            .unwrap();

        let captured = shooter.captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].0.contains("标题"));
        assert_eq!(captured[0].1, ".container");
        assert_eq!(captured[0].2, padding);
        assert!(output.exists());
    }
}
