use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::backend::NewsSource;
use crate::classifier;
use crate::gateway::ChatGateway;
use crate::highlighter;
use crate::models::{Article, Tier};
use crate::store::{ReviewStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("a date range needs both a start and an end date")]
    Incomplete,
    #[error("give either a single date or a start/end range, not both")]
    Conflicting,
}

/// Which calendar days to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

impl DateSelection {
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::EndBeforeStart { start, end });
        }
        Ok(DateSelection::Range { start, end })
    }

    /// Resolves command-line style arguments; nothing given means `today`.
    pub fn from_args(
        date: Option<NaiveDate>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, DateRangeError> {
        match (date, start, end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(DateRangeError::Conflicting),
            (Some(date), None, None) => Ok(DateSelection::Single(date)),
            (None, Some(start), Some(end)) => Self::range(start, end),
            (None, Some(_), None) | (None, None, Some(_)) => Err(DateRangeError::Incomplete),
            (None, None, None) => Ok(DateSelection::Single(today)),
        }
    }

    /// Every day in the selection, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match *self {
            DateSelection::Single(date) => vec![date],
            DateSelection::Range { start, end } => start
                .iter_days()
                .take_while(|day| *day <= end)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleAnalysis {
    pub content: String,
    pub tier: Tier,
    pub reason: String,
}

/// Classifies, then highlights, one article.
pub async fn process_article(
    gateway: &dyn ChatGateway,
    title: &str,
    content: &str,
) -> ArticleAnalysis {
    let classification = classifier::classify(gateway, title, content).await;
    let highlighted = highlighter::highlight(gateway, content).await;

    ArticleAnalysis {
        content: highlighted,
        tier: classification.tier,
        reason: classification.reason,
    }
}

/// Progress notifications emitted while ingesting.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    DayFetched { date: NaiveDate, count: usize },
    Duplicate { title: String },
    Processed {
        index: usize,
        total: usize,
        title: String,
        tier: Tier,
        reason: String,
    },
    DaySaved { date: NaiveDate, added: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub dates: usize,
    pub fetched: usize,
    pub new_count: usize,
    pub total_count: usize,
}

impl IngestReport {
    /// Everything fetched was already stored, or nothing was fetched.
    pub fn no_new_data(&self) -> bool {
        self.new_count == 0
    }
}

/// Pulls daily items from a news source into the review store.
///
/// Items are handled strictly one after another. Without a gateway every
/// item is stored as `recommend` with its body untouched.
pub struct Ingestor<'a> {
    source: &'a dyn NewsSource,
    gateway: Option<&'a dyn ChatGateway>,
}

impl<'a> Ingestor<'a> {
    pub fn new(source: &'a dyn NewsSource, gateway: Option<&'a dyn ChatGateway>) -> Self {
        Self { source, gateway }
    }

    pub async fn ingest(
        &self,
        store: &mut ReviewStore,
        selection: DateSelection,
    ) -> Result<IngestReport, StoreError> {
        self.ingest_with_progress(store, selection, |_| {}).await
    }

    pub async fn ingest_with_progress<F>(
        &self,
        store: &mut ReviewStore,
        selection: DateSelection,
        mut on_event: F,
    ) -> Result<IngestReport, StoreError>
    where
        F: FnMut(&IngestEvent),
    {
        let dates = selection.dates();
        let mut report = IngestReport {
            dates: dates.len(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = store.titles();

        for date in dates {
            let items = self.source.fetch_day(date).await;
            report.fetched += items.len();
            on_event(&IngestEvent::DayFetched {
                date,
                count: items.len(),
            });

            let total = items.len();
            let mut rows = Vec::new();
            for (index, item) in items.iter().enumerate() {
                if !seen.insert(item.title.clone()) {
                    debug!(title = %item.title, "skipping stored title");
                    on_event(&IngestEvent::Duplicate {
                        title: item.title.clone(),
                    });
                    continue;
                }

                let analysis = match self.gateway {
                    Some(gateway) if !item.content.trim().is_empty() => {
                        process_article(gateway, &item.title, &item.content).await
                    }
                    _ => ArticleAnalysis {
                        content: item.content.clone(),
                        tier: Tier::Recommend,
                        reason: String::new(),
                    },
                };

                on_event(&IngestEvent::Processed {
                    index: index + 1,
                    total,
                    title: item.title.clone(),
                    tier: analysis.tier,
                    reason: analysis.reason.clone(),
                });

                rows.push(Article::from_item(
                    date,
                    item,
                    analysis.content,
                    analysis.tier,
                    analysis.reason,
                ));
            }

            let added = store.append(rows)?;
            report.new_count += added;
            on_event(&IngestEvent::DaySaved { date, added });
        }

        report.total_count = store.len();
        info!(
            fetched = report.fetched,
            new = report.new_count,
            total = report.total_count,
            "ingestion finished"
        );

        Ok(report)
    }
}
