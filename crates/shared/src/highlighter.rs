use crate::gateway::{ChatGateway, Completion};
use crate::markup::{bold_count, strip_bold};
use tracing::{debug, warn};

const MIN_CONTENT_CHARS: usize = 10;
const MAX_TOKENS: u32 = 4000;

const PROMPT: &str = r#"# Role
You are the editor-in-chief of a legal-tech news digest. Keep the signal-to-noise ratio high while making sure each page has a visible focal point.

# Task
Read the article below and highlight a few spans using a tiered recall strategy.

# Tiered strategy (apply silently, output only the result)
1. Tier 1, hard signals: concrete amounts or deal prices, effective dates or deadlines, definitive conclusions, concrete efficiency figures.
   If any Tier 1 span exists, highlight only Tier 1 spans and ignore Tier 2 entirely.
2. Tier 2, soft signals, only when Tier 1 found nothing: growth rates, market position claims, milestone actions, positive quotes.
3. If neither tier finds anything, return the text exactly as given.

# Constraints
1. Wrap each highlighted span in double asterisks: **span**. Highlight 2 to 4 spans.
2. Each span is short: 4 to 10 Chinese characters or a few words.
3. Never change, add, drop or reorder any other character. Output the full text only, with no commentary.

# Examples
<Input>
Elite 平台订阅用户激增 125%，过去 12 个月处理账单交易额达 720 亿美元。原生集成的 Payments 功能将付款周期缩短 40%。
</Input>
<Output>
Elite 平台订阅用户激增 125%，过去 12 个月处理账单交易额达 **720 亿美元**。原生集成的 Payments 功能将付款周期 **缩短 40%**。
</Output>

<Input>
Clarra 推出了业界首个全球案件管理平台，订阅用户量同比激增 125％，持续引领数字化转型。
</Input>
<Output>
Clarra 推出了**业界首个全球案件管理平台**，订阅用户量**同比激增 125％**，持续引领数字化转型。
</Output>

<Input>
我们致力于构建开放的生态系统，赋能每一位律师实现价值飞跃，共创美好未来。
</Input>
<Output>
我们致力于构建开放的生态系统，赋能每一位律师实现价值飞跃，共创美好未来。
</Output>

Article:
"#;

/// Wraps a few important spans of `content` in `**` markers.
///
/// The result always strips back to `content` byte-for-byte. Output that
/// rewrites the text in any other way is discarded in favour of the input.
/// Content that already carries markers is returned as is, without a call.
pub async fn highlight(gateway: &dyn ChatGateway, content: &str) -> String {
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return content.to_string();
    }
    if content.contains("**") {
        debug!("content already highlighted, skipping");
        return content.to_string();
    }

    let prompt = format!("{}{}", PROMPT, content);
    let output = match gateway.complete(&prompt, MAX_TOKENS).await {
        Completion::Text(text) => text,
        Completion::Empty | Completion::Failed(_) => return content.to_string(),
    };

    match reconcile(content, &output) {
        Some(highlighted) => {
            debug!(spans = bold_count(&highlighted), "highlighted content");
            highlighted
        }
        None => {
            warn!("highlight output altered the wording, keeping the original text");
            content.to_string()
        }
    }
}

/// Re-attaches the input's surrounding whitespace to the model output and
/// accepts it only if removing the markers gives back the input exactly.
fn reconcile(original: &str, output: &str) -> Option<String> {
    let core = original.trim();
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];

    let output = output.trim();
    if strip_bold(output) != core {
        return None;
    }
    Some(format!("{}{}{}", leading, output, trailing))
}
