use serde::Serialize;

use super::source_name;
use crate::markup::parse_spans;
use crate::models::Article;

const BLOCK_TEXT: u8 = 2;
const BLOCK_HEADING2: u8 = 4;
const PARAGRAPH_MAX_CHARS: usize = 2000;
const DIVIDER: &str = "———————————————————";

/// One child block of the collaborative document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub block_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading2: Option<TextBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockStyle {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBody {
    pub style: BlockStyle,
    pub elements: Vec<TextElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextElement {
    pub text_run: TextRun,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_element_style: Option<TextStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub url: String,
}

impl TextElement {
    fn plain(content: impl Into<String>) -> Self {
        Self {
            text_run: TextRun {
                content: content.into(),
                text_element_style: None,
            },
        }
    }

    fn bold(content: impl Into<String>) -> Self {
        Self {
            text_run: TextRun {
                content: content.into(),
                text_element_style: Some(TextStyle {
                    bold: Some(true),
                    link: None,
                }),
            },
        }
    }

    fn link(content: impl Into<String>, url: &str) -> Self {
        Self {
            text_run: TextRun {
                content: content.into(),
                text_element_style: Some(TextStyle {
                    bold: None,
                    link: Some(Link {
                        url: url.to_string(),
                    }),
                }),
            },
        }
    }

    pub fn is_bold(&self) -> bool {
        self.text_run
            .text_element_style
            .as_ref()
            .and_then(|s| s.bold)
            .unwrap_or(false)
    }
}

impl Block {
    fn heading2(elements: Vec<TextElement>) -> Self {
        Self {
            block_type: BLOCK_HEADING2,
            heading2: Some(TextBody {
                style: BlockStyle::default(),
                elements,
            }),
            text: None,
        }
    }

    fn text(elements: Vec<TextElement>) -> Self {
        Self {
            block_type: BLOCK_TEXT,
            heading2: None,
            text: Some(TextBody {
                style: BlockStyle::default(),
                elements,
            }),
        }
    }

    /// Runs of the heading or text body.
    pub fn elements(&self) -> &[TextElement] {
        self.heading2
            .as_ref()
            .or(self.text.as_ref())
            .map(|body| body.elements.as_slice())
            .unwrap_or_default()
    }
}

pub struct DocumentBuilder;

impl DocumentBuilder {
    /// Heading, body paragraphs and source line per article, with a divider
    /// between articles.
    pub fn build(articles: &[Article]) -> Vec<Block> {
        let mut blocks = Vec::new();

        for (index, article) in articles.iter().enumerate() {
            blocks.push(Block::heading2(vec![TextElement::plain(format!(
                "{:02} {}",
                index + 1,
                article.title
            ))]));

            for paragraph in article.content.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                blocks.push(Block::text(Self::paragraph_elements(paragraph)));
            }

            if let Some(source_block) = Self::source_block(article) {
                blocks.push(source_block);
            }

            if index + 1 < articles.len() {
                blocks.push(Block::text(vec![TextElement::plain(DIVIDER)]));
            }
        }

        blocks
    }

    /// Bold runs for one paragraph, capped by visible characters so a cut
    /// never splits a marker pair.
    fn paragraph_elements(paragraph: &str) -> Vec<TextElement> {
        let mut elements = Vec::new();
        let mut remaining = PARAGRAPH_MAX_CHARS;
        let mut truncated = false;

        for span in parse_spans(paragraph) {
            if remaining == 0 {
                truncated = true;
                break;
            }
            let len = span.text.chars().count();
            let text = if len > remaining {
                truncated = true;
                span.text.chars().take(remaining).collect()
            } else {
                span.text
            };
            remaining = remaining.saturating_sub(len);

            elements.push(if span.bold {
                TextElement::bold(text)
            } else {
                TextElement::plain(text)
            });
            if truncated {
                break;
            }
        }

        if truncated {
            match elements.last_mut() {
                Some(last) if !last.is_bold() => last.text_run.content.push_str("..."),
                _ => elements.push(TextElement::plain("...")),
            }
        }
        elements
    }

    fn source_block(article: &Article) -> Option<Block> {
        let name = source_name(article);
        if name.is_empty() {
            return None;
        }

        let url = article.url.trim();
        let elements = if url.is_empty() {
            vec![TextElement::plain(format!("Source: {}", name))]
        } else {
            vec![TextElement::plain("Source: "), TextElement::link(name, url)]
        };
        Some(Block::text(elements))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::article;
    use super::*;
    use serde_json::json;

    fn runs(block: &Block) -> Vec<(String, bool)> {
        block
            .elements()
            .iter()
            .map(|e| (e.text_run.content.clone(), e.is_bold()))
            .collect()
    }

    #[test]
    fn test_block_layout_for_two_articles() {
        let articles = vec![
            article("First", "Para one.\n\nPara **two**."),
            article("Second", "Only para."),
        ];
        let blocks = DocumentBuilder::build(&articles);

        let kinds: Vec<u8> = blocks.iter().map(|b| b.block_type).collect();
        // heading, 2 paragraphs, source, divider, heading, paragraph, source
        assert_eq!(kinds, vec![4, 2, 2, 2, 2, 4, 2, 2]);
        assert_eq!(runs(&blocks[0]), vec![("01 First".to_string(), false)]);
        assert_eq!(runs(&blocks[4]), vec![(DIVIDER.to_string(), false)]);
        assert_eq!(runs(&blocks[5]), vec![("02 Second".to_string(), false)]);
    }

    #[test]
    fn test_bold_runs_preserve_marker_positions() {
        let text = "法院**首次**认定，AI 生成内容**享有著作权**。";
        let blocks = DocumentBuilder::build(&[article("T", text)]);

        let body = runs(&blocks[1]);
        assert_eq!(
            body,
            vec![
                ("法院".to_string(), false),
                ("首次".to_string(), true),
                ("认定，AI 生成内容".to_string(), false),
                ("享有著作权".to_string(), true),
                ("。".to_string(), false),
            ]
        );

        let rebuilt: String = body
            .iter()
            .map(|(t, bold)| if *bold { format!("**{}**", t) } else { t.clone() })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_long_paragraph_is_capped() {
        let long = "字".repeat(2100);
        let blocks = DocumentBuilder::build(&[article("T", &long)]);
        let content = &blocks[1].elements()[0].text_run.content;

        assert_eq!(content.chars().count(), 2003);
        assert!(content.ends_with("..."));
    }

    #[test]
    fn test_cap_inside_bold_span_keeps_runs_paired() {
        let text = format!("{}**important span**", "字".repeat(1995));
        let blocks = DocumentBuilder::build(&[article("T", &text)]);

        assert_eq!(
            runs(&blocks[1]),
            vec![
                ("字".repeat(1995), false),
                ("impor".to_string(), true),
                ("...".to_string(), false),
            ]
        );
        assert!(blocks[1]
            .elements()
            .iter()
            .all(|e| !e.text_run.content.contains("**")));
    }

    #[test]
    fn test_cap_on_span_boundary() {
        let text = format!("{}**bold**tail", "字".repeat(2000));
        let blocks = DocumentBuilder::build(&[article("T", &text)]);

        assert_eq!(runs(&blocks[1]), vec![(format!("{}...", "字".repeat(2000)), false)]);
    }

    #[test]
    fn test_source_line_variants() {
        let linked = DocumentBuilder::build(&[article("T", "")]);
        assert_eq!(
            runs(&linked[1]),
            vec![("Source: ".to_string(), false), ("Legal Daily".to_string(), false)]
        );

        let mut unlinked = article("T", "");
        unlinked.url = String::new();
        let blocks = DocumentBuilder::build(&[unlinked]);
        assert_eq!(runs(&blocks[1]), vec![("Source: Legal Daily".to_string(), false)]);

        let mut anonymous = article("T", "");
        anonymous.url = String::new();
        anonymous.source = String::new();
        assert_eq!(DocumentBuilder::build(&[anonymous]).len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let blocks = DocumentBuilder::build(&[article("T", "a **b**")]);
        let value = serde_json::to_value(&blocks).unwrap();

        assert_eq!(
            value[0],
            json!({"block_type": 4, "heading2": {"style": {}, "elements": [
                {"text_run": {"content": "01 T"}}
            ]}})
        );
        assert_eq!(
            value[1],
            json!({"block_type": 2, "text": {"style": {}, "elements": [
                {"text_run": {"content": "a "}},
                {"text_run": {"content": "b", "text_element_style": {"bold": true}}}
            ]}})
        );
        assert_eq!(
            value[2]["text"]["elements"][1]["text_run"]["text_element_style"]["link"]["url"],
            "https://news.example/a"
        );
    }
}
