use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recommendation strength assigned by the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Tier {
    StrongRecommend,
    Recommend,
    #[default]
    Neutral,
    NotRecommended,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::StrongRecommend,
        Tier::Recommend,
        Tier::Neutral,
        Tier::NotRecommended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::StrongRecommend => "strong-recommend",
            Tier::Recommend => "recommend",
            Tier::Neutral => "neutral",
            Tier::NotRecommended => "not-recommended",
        }
    }

    /// Sort position: strong-recommend first.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::StrongRecommend => 1,
            Tier::Recommend => 2,
            Tier::Neutral => 3,
            Tier::NotRecommended => 4,
        }
    }

    /// Parses the English label or the legacy spreadsheet label.
    /// Anything outside the closed set yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let cleaned = value
            .trim()
            .trim_matches(|c| matches!(c, '[' | ']' | '【' | '】' | '"' | '\''))
            .trim()
            .to_lowercase();

        match cleaned.as_str() {
            "strong-recommend" | "strong recommend" | "强烈推荐" => Some(Tier::StrongRecommend),
            "recommend" | "推荐" => Some(Tier::Recommend),
            "neutral" | "一般" => Some(Tier::Neutral),
            "not-recommended" | "not recommended" | "不推荐" => Some(Tier::NotRecommended),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0:?} (expected strong-recommend, recommend, neutral or not-recommended)")]
pub struct TierParseError(pub String);

impl FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse(s).ok_or_else(|| TierParseError(s.to_string()))
    }
}

// Rows written before classification existed, or hand-edited with a typo,
// collapse to the default tier instead of failing the whole load.
impl From<String> for Tier {
    fn from(value: String) -> Self {
        Tier::parse(&value).unwrap_or_default()
    }
}

/// Human review state of an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Keep,
    Discard,
    Published(String),
}

impl ReviewStatus {
    pub fn is_published(&self) -> bool {
        matches!(self, ReviewStatus::Published(_))
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => f.write_str("pending"),
            ReviewStatus::Keep => f.write_str("keep"),
            ReviewStatus::Discard => f.write_str("discard"),
            ReviewStatus::Published(volume) => write!(f, "published:{}", volume),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown review status: {0:?}")]
pub struct StatusParseError(pub String);

impl FromStr for ReviewStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const PUBLISHED: &str = "published:";
        let trimmed = s.trim();

        let has_prefix = trimmed
            .get(..PUBLISHED.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(PUBLISHED));
        if has_prefix {
            let volume = trimmed[PUBLISHED.len()..].trim();
            if volume.is_empty() {
                return Err(StatusParseError(s.to_string()));
            }
            return Ok(ReviewStatus::Published(volume.to_string()));
        }

        match trimmed.to_lowercase().as_str() {
            "" | "pending" | "待审核" => Ok(ReviewStatus::Pending),
            "keep" | "入库" => Ok(ReviewStatus::Keep),
            "discard" | "垃圾" => Ok(ReviewStatus::Discard),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

impl From<ReviewStatus> for String {
    fn from(status: ReviewStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ReviewStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Selects rows by review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Keep,
    Discard,
    Published,
}

impl StatusFilter {
    pub fn matches(&self, status: &ReviewStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => *status == ReviewStatus::Pending,
            StatusFilter::Keep => *status == ReviewStatus::Keep,
            StatusFilter::Discard => *status == ReviewStatus::Discard,
            StatusFilter::Published => status.is_published(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "keep" => Ok(StatusFilter::Keep),
            "discard" => Ok(StatusFilter::Discard),
            "published" | "published:*" => Ok(StatusFilter::Published),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// One news item as delivered by the aggregation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNewsItem {
    pub title: String,
    pub content: String,
    pub url: String,
    pub source: String,
    pub rank: i64,
    pub score: f64,
}

/// One row of the review store.
///
/// Legacy spreadsheet headers are accepted as aliases so older files load
/// without a conversion step; columns missing from older files take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(alias = "收录日期")]
    pub date: NaiveDate,
    #[serde(alias = "每日排名", default, deserialize_with = "lenient_i64")]
    pub rank: i64,
    #[serde(alias = "评分", default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(alias = "标题")]
    pub title: String,
    #[serde(alias = "链接", default)]
    pub url: String,
    #[serde(alias = "来源名称", default)]
    pub source: String,
    #[serde(alias = "原文内容", default)]
    pub content: String,
    #[serde(alias = "AI分类", default)]
    pub ai_tier: Tier,
    #[serde(alias = "AI理由", default)]
    pub ai_reason: String,
    #[serde(alias = "人工审核", default)]
    pub review: ReviewStatus,
    #[serde(alias = "发布顺序", default, deserialize_with = "lenient_order")]
    pub publish_order: Option<u32>,
}

impl Article {
    /// Builds a freshly ingested, pending row.
    pub fn from_item(
        date: NaiveDate,
        item: &RawNewsItem,
        content: String,
        tier: Tier,
        reason: String,
    ) -> Self {
        Self {
            date,
            rank: item.rank,
            score: item.score,
            title: item.title.clone(),
            url: item.url.clone(),
            source: item.source.clone(),
            content,
            ai_tier: tier,
            ai_reason: reason,
            review: ReviewStatus::Pending,
            publish_order: None,
        }
    }
}

// Spreadsheet tools write NaN cells as empty strings and integer columns
// with gaps as floats ("3.0"), so numeric columns are parsed by hand.

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(0.0);
    }
    trimmed.parse::<f64>().map_err(serde::de::Error::custom)
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = lenient_f64(deserializer)?;
    Ok(value as i64)
}

fn lenient_order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value = trimmed.parse::<f64>().map_err(serde::de::Error::custom)?;
    if value < 1.0 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "publish order must be a positive integer, got {}",
            trimmed
        )));
    }
    Ok(Some(value as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse_accepts_both_vocabularies() {
        assert_eq!(Tier::parse("strong-recommend"), Some(Tier::StrongRecommend));
        assert_eq!(Tier::parse("强烈推荐"), Some(Tier::StrongRecommend));
        assert_eq!(Tier::parse("  Recommend "), Some(Tier::Recommend));
        assert_eq!(Tier::parse("[neutral]"), Some(Tier::Neutral));
        assert_eq!(Tier::parse("不推荐"), Some(Tier::NotRecommended));
        assert_eq!(Tier::parse("must-read"), None);
        assert_eq!(Tier::parse(""), None);
    }

    #[test]
    fn test_tier_unknown_string_collapses_to_neutral() {
        assert_eq!(Tier::from("extremely recommended".to_string()), Tier::Neutral);
    }

    #[test]
    fn test_tier_from_str_is_strict() {
        assert_eq!("strong-recommend".parse::<Tier>(), Ok(Tier::StrongRecommend));
        assert_eq!("不推荐".parse::<Tier>(), Ok(Tier::NotRecommended));
        assert!("great".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_rank_order() {
        let ranks: Vec<u8> = Tier::ALL.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_review_status_parse() {
        assert_eq!("pending".parse::<ReviewStatus>(), Ok(ReviewStatus::Pending));
        assert_eq!("".parse::<ReviewStatus>(), Ok(ReviewStatus::Pending));
        assert_eq!("入库".parse::<ReviewStatus>(), Ok(ReviewStatus::Keep));
        assert_eq!("垃圾".parse::<ReviewStatus>(), Ok(ReviewStatus::Discard));
        assert_eq!(
            "published:12".parse::<ReviewStatus>(),
            Ok(ReviewStatus::Published("12".to_string()))
        );
        assert!("published:".parse::<ReviewStatus>().is_err());
        assert!("maybe".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_review_status_display_round_trips() {
        let statuses = [
            ReviewStatus::Pending,
            ReviewStatus::Keep,
            ReviewStatus::Discard,
            ReviewStatus::Published("7".to_string()),
        ];
        for status in statuses {
            assert_eq!(status.to_string().parse::<ReviewStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_filter_matches_any_volume() {
        let published = ReviewStatus::Published("3".to_string());
        assert!(StatusFilter::Published.matches(&published));
        assert!(StatusFilter::All.matches(&published));
        assert!(!StatusFilter::Keep.matches(&published));
    }
}
