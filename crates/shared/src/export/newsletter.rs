use super::{escape_html, source_name, volume_heading};
use crate::markup::parse_spans;
use crate::models::Article;

const FONT_SIZE: &str = "15px";
const LINE_HEIGHT: &str = "1.8";
const PADDING: &str = "0 8px";
const LINK_COLOR: &str = "#576b95";
const ACCENT_COLOR: &str = "#0336CB";
const DIVIDER_COLOR: &str = "#e5e5e5";

/// Inline-styled HTML for pasting into the newsletter editor, which strips
/// `<style>` blocks and classes.
pub struct NewsletterFormatter;

impl NewsletterFormatter {
    pub fn render(articles: &[Article], volume: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        let volume = volume.trim();
        if !volume.is_empty() {
            parts.push(format!(
                "<section style=\"padding: 16px 8px; text-align: center;\">\n  \
                 <p style=\"font-size: 20px; font-weight: bold; color: {}; margin: 0;\">{}</p>\n\
                 </section>",
                ACCENT_COLOR,
                escape_html(&volume_heading(volume))
            ));
        }

        for (index, article) in articles.iter().enumerate() {
            parts.push(Self::article_section(index + 1, article));

            if index + 1 < articles.len() {
                parts.push(format!(
                    "<section style=\"padding: 12px 8px;\">\n  \
                     <hr style=\"border: none; border-top: 1px solid {}; margin: 0;\"/>\n\
                     </section>",
                    DIVIDER_COLOR
                ));
            }
        }

        parts.push(
            "<section style=\"padding: 24px 8px; text-align: center;\">\n  \
             <p style=\"font-size: 14px; color: #999; margin: 0;\">———— END ————</p>\n  \
             <p style=\"font-size: 14px; color: #999; margin: 8px 0 0 0;\">📮 LawGeek Legal Tech Weekly | The week's legal-tech highlights</p>\n\
             </section>"
                .to_string(),
        );

        parts.join("\n")
    }

    fn article_section(number: usize, article: &Article) -> String {
        let mut html = String::new();

        html.push_str("<section style=\"padding: 8px 0;\">\n");
        html.push_str(&format!(
            "  <p style=\"font-size: 17px; font-weight: bold; color: {}; padding: {}; margin: 0 0 12px 0;\">",
            ACCENT_COLOR, PADDING
        ));
        html.push_str(&format!(
            "<span style=\"display: inline-block; width: 22px; height: 22px; line-height: 22px; \
             text-align: center; background-color: {}; color: white; border-radius: 50%; \
             font-size: 13px; font-weight: bold; margin-right: 8px; vertical-align: middle;\">{}</span>",
            ACCENT_COLOR, number
        ));
        html.push_str(&format!(
            "<span style=\"vertical-align: middle;\">{}</span></p>\n",
            escape_html(&article.title)
        ));

        for paragraph in article.content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            html.push_str(&format!(
                "  <p style=\"font-size: {}; line-height: {}; text-align: justify; padding: {}; margin: 0 0 12px 0; color: #333;\">{}</p>\n",
                FONT_SIZE,
                LINE_HEIGHT,
                PADDING,
                Self::paragraph_html(paragraph)
            ));
        }

        let source = source_name(article);
        let url = article.url.trim();
        if !source.is_empty() {
            if url.is_empty() {
                html.push_str(&format!(
                    "  <p style=\"font-size: 14px; padding: {}; margin: 8px 0 0 0; color: #999;\">Source: {}</p>\n",
                    PADDING,
                    escape_html(&source)
                ));
            } else {
                html.push_str(&format!(
                    "  <p style=\"font-size: 14px; padding: {}; margin: 8px 0 0 0;\"><span style=\"color: #999;\">Source: </span>\
                     <a href=\"{}\" style=\"color: {}; text-decoration: none;\">{}</a></p>\n",
                    PADDING,
                    escape_html(url),
                    LINK_COLOR,
                    escape_html(&source)
                ));
            }
        }

        html.push_str("</section>");
        html
    }

    fn paragraph_html(paragraph: &str) -> String {
        parse_spans(paragraph)
            .into_iter()
            .map(|span| {
                let text = escape_html(&span.text).replace('\n', "<br/>");
                if span.bold {
                    format!("<strong style=\"color: {};\">{}</strong>", ACCENT_COLOR, text)
                } else {
                    text
                }
            })
            .collect()
    }
}
