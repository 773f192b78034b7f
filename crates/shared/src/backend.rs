use anyhow::Context;
use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::RawNewsItem;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("backend reported status {code}: {text}")]
    Api { code: i64, text: String },
    #[error("could not decode backend payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A source of ranked daily news items.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Items for one calendar day in rank order. Unavailable data is an
    /// empty list, never an error.
    async fn fetch_day(&self, date: NaiveDate) -> Vec<RawNewsItem>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    status_code: Option<i64>,
    #[serde(default)]
    status_text: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    content: Vec<BackendItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reference_links: Option<String>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    remake_index: Option<f64>,
    #[serde(default)]
    score: Option<f64>,
}

impl From<BackendItem> for RawNewsItem {
    fn from(item: BackendItem) -> Self {
        RawNewsItem {
            title: item.title.unwrap_or_default(),
            content: item.content.unwrap_or_default(),
            url: item.reference_links.unwrap_or_default(),
            source: item.reference.unwrap_or_default(),
            rank: item.remake_index.unwrap_or(0.0) as i64,
            score: item.score.unwrap_or(0.0),
        }
    }
}

/// Client for the news aggregation backend's daily summary endpoint.
pub struct BackendClient {
    client: Client,
    base_url: String,
    plan_id: String,
}

impl BackendClient {
    pub fn new(base_url: &str, plan_id: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            plan_id: plan_id.to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        Self::new(&config.backend_url, config.plan_id()?)
    }

    fn day_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/api/summary/detailsSummary/{}?date={}",
            self.base_url,
            urlencoding::encode(&self.plan_id),
            day_timestamp_millis(date)
        )
    }

    pub async fn try_fetch_day(&self, date: NaiveDate) -> Result<Vec<RawNewsItem>, BackendError> {
        let response = self.client.get(self.day_url(date)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(%date, payload = %body, "raw backend payload");

        let envelope: Envelope = serde_json::from_str(&body)?;
        if envelope.status_code != Some(200) {
            return Err(BackendError::Api {
                code: envelope.status_code.unwrap_or_default(),
                text: envelope
                    .status_text
                    .unwrap_or_else(|| String::from("unknown error")),
            });
        }

        let mut items: Vec<RawNewsItem> = envelope
            .data
            .unwrap_or_default()
            .content
            .into_iter()
            .map(RawNewsItem::from)
            .collect();
        // Stable, so equal ranks keep backend order
        items.sort_by_key(|item| item.rank);

        Ok(items)
    }
}

#[async_trait]
impl NewsSource for BackendClient {
    async fn fetch_day(&self, date: NaiveDate) -> Vec<RawNewsItem> {
        match self.try_fetch_day(date).await {
            Ok(items) => {
                info!(%date, count = items.len(), "fetched news items");
                items
            }
            Err(e) => {
                warn!(%date, error = %e, "backend fetch failed, treating day as empty");
                Vec::new()
            }
        }
    }
}

/// Epoch milliseconds of local midnight on `date`.
pub fn day_timestamp_millis(date: NaiveDate) -> i64 {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(local) => local.timestamp_millis(),
        None => midnight.and_utc().timestamp_millis(),
    }
}
