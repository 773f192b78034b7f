use crate::gateway::{ChatGateway, Completion};
use crate::models::Tier;
use tracing::debug;

const MIN_CONTENT_CHARS: usize = 20;
const EXCERPT_CHARS: usize = 1500;
const MAX_TOKENS: u32 = 200;

pub const REASON_TOO_SHORT: &str = "content too short";
pub const REASON_FAILED: &str = "AI analysis failed";
pub const REASON_NONE: &str = "none";

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: Tier,
    pub reason: String,
}

impl Classification {
    fn neutral(reason: &str) -> Self {
        Self {
            tier: Tier::Neutral,
            reason: reason.to_string(),
        }
    }
}

/// Asks the model whether an article belongs in the weekly digest.
///
/// Never fails: short content, an empty completion and unparseable output
/// all yield a neutral classification with an explanatory reason.
pub async fn classify(gateway: &dyn ChatGateway, title: &str, content: &str) -> Classification {
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return Classification::neutral(REASON_TOO_SHORT);
    }

    let prompt = build_prompt(title, content);
    match gateway.complete(&prompt, MAX_TOKENS).await {
        Completion::Text(text) => parse_response(&text),
        Completion::Empty | Completion::Failed(_) => Classification::neutral(REASON_FAILED),
    }
}

fn build_prompt(title: &str, content: &str) -> String {
    let excerpt: String = content.chars().take(EXCERPT_CHARS).collect();

    format!(
        r#"You are an editor for a legal technology weekly. Based on the title and content below, decide whether this article should be included in the weekly digest.

Criteria:
1. Relevance: legal technology, legal AI, compliance technology, innovation in legal services
2. Quality: information value, depth, timeliness, readability
3. Audience: legal practitioners, legal-tech professionals, readers interested in legal technology

Reply with exactly these two lines and nothing else:
classification: [strong-recommend/recommend/neutral/not-recommended]
reason: [one sentence, at most 50 characters]

Title: {}

Content:
{}
"#,
        title, excerpt
    )
}

/// Extracts the two labeled lines. Missing lines keep their defaults and a
/// tier outside the closed set collapses to neutral.
fn parse_response(text: &str) -> Classification {
    let mut tier = Tier::Neutral;
    let mut reason = REASON_NONE.to_string();

    for line in text.lines() {
        if let Some(value) = labeled_value(line, &["classification", "分类"]) {
            tier = Tier::parse(value).unwrap_or_else(|| {
                debug!(value, "classification outside the known tiers");
                Tier::Neutral
            });
        } else if let Some(value) = labeled_value(line, &["reason", "理由"]) {
            if !value.is_empty() {
                reason = value.to_string();
            }
        }
    }

    Classification { tier, reason }
}

/// Returns the text after `label:` or `label：` when the line starts with
/// one of the labels (ASCII labels match case-insensitively). Leading list
/// and bold markers are ignored.
fn labeled_value<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let line = line.trim().trim_start_matches(['*', '-', ' ']);
    labels.iter().find_map(|label| {
        let head = line.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = line[label.len()..].trim_start_matches('*').trim_start();
        let value = rest
            .strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))?;
        Some(value.trim().trim_matches('*').trim())
    })
}
