//! The one piece of inline markup the digest uses: `**bold**`.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

fn bold_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Non-greedy and single-line: `**a** and **b**` is two spans, and a
    // marker never pairs across a line break.
    PATTERN.get_or_init(|| Regex::new(r"\*\*([^\n]+?)\*\*").expect("static regex"))
}

/// Splits text into alternating plain and bold runs.
///
/// Unpaired markers stay in the plain text. Empty runs are dropped, so
/// concatenating the span texts gives the input with paired markers removed.
pub fn parse_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in bold_pattern().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span {
                text: text[last..whole.start()].to_string(),
                bold: false,
            });
        }
        spans.push(Span {
            text: inner.as_str().to_string(),
            bold: true,
        });
        last = whole.end();
    }

    if last < text.len() {
        spans.push(Span {
            text: text[last..].to_string(),
            bold: false,
        });
    }

    spans
}

/// Removes every `**` marker.
pub fn strip_bold(text: &str) -> String {
    text.replace("**", "")
}

/// Number of paired `**...**` runs.
pub fn bold_count(text: &str) -> usize {
    bold_pattern().find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spans_mixed() {
        let spans = parse_spans("a **b** c **d**");
        assert_eq!(
            spans,
            vec![
                Span { text: "a ".into(), bold: false },
                Span { text: "b".into(), bold: true },
                Span { text: " c ".into(), bold: false },
                Span { text: "d".into(), bold: true },
            ]
        );
    }

    #[test]
    fn test_parse_spans_plain_only() {
        let spans = parse_spans("no markers here");
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].bold);
    }

    #[test]
    fn test_unpaired_marker_stays_plain() {
        let spans = parse_spans("cost **up 10%");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "cost **up 10%");
    }

    #[test]
    fn test_marker_does_not_cross_lines() {
        assert_eq!(bold_count("**a\nb**"), 0);
    }

    #[test]
    fn test_strip_bold_removes_all_markers() {
        assert_eq!(strip_bold("**融资**完成，估值**10亿**"), "融资完成，估值10亿");
    }

    #[test]
    fn test_spans_concatenate_to_stripped_text() {
        let text = "法院**首次**认定AI生成内容**享有著作权**。";
        let joined: String = parse_spans(text).into_iter().map(|s| s.text).collect();
        assert_eq!(joined, strip_bold(text));
    }
}
