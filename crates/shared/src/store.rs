use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{Article, ReviewStatus, StatusFilter, Tier};

/// Column order of the store file.
pub const COLUMNS: [&str; 11] = [
    "date",
    "rank",
    "score",
    "title",
    "url",
    "source",
    "content",
    "ai_tier",
    "ai_reason",
    "review",
    "publish_order",
];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no article titled {0:?}")]
    NotFound(String),
    #[error("invalid volume id {0:?}: it must be non-empty and contain no path separators")]
    InvalidVolume(String),
    #[error("publish order must be a positive integer")]
    InvalidOrder,
    #[error("status {0} can only be assigned by archiving")]
    InvalidStatus(ReviewStatus),
    #[error("snapshot already exists: {0}")]
    SnapshotExists(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveReport {
    pub volume: String,
    pub published: usize,
    pub discarded: usize,
    pub published_snapshot: PathBuf,
    pub discarded_snapshot: PathBuf,
}

/// The live review table: one CSV row per article, keyed by title.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename. The in-memory rows only change once that write has succeeded.
/// There is no locking; concurrent writers overwrite each other.
#[derive(Debug)]
pub struct ReviewStore {
    path: PathBuf,
    articles: Vec<Article>,
}

impl ReviewStore {
    /// Loads the store. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let articles = if path.exists() {
            read_rows(&path)?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), rows = articles.len(), "opened review store");

        Ok(Self { path, articles })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.articles.iter().any(|a| a.title == title)
    }

    pub fn titles(&self) -> HashSet<String> {
        self.articles.iter().map(|a| a.title.clone()).collect()
    }

    /// Rows matching `filter`, in store order.
    pub fn list(&self, filter: StatusFilter) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| filter.matches(&a.review))
            .collect()
    }

    pub fn set_status(&mut self, title: &str, status: ReviewStatus) -> Result<(), StoreError> {
        if status.is_published() {
            return Err(StoreError::InvalidStatus(status));
        }
        self.update(title, |article| article.review = status.clone())
    }

    /// Replaces the model's tier with the curator's.
    pub fn set_tier(&mut self, title: &str, tier: Tier) -> Result<(), StoreError> {
        self.update(title, |article| article.ai_tier = tier)
    }

    /// Sets or clears the manual publish order.
    pub fn set_order(&mut self, title: &str, order: Option<u32>) -> Result<(), StoreError> {
        if order == Some(0) {
            return Err(StoreError::InvalidOrder);
        }
        self.update(title, |article| article.publish_order = order)
    }

    /// Kept rows sorted for publication.
    pub fn kept_in_publish_order(&self) -> Vec<Article> {
        let mut kept: Vec<Article> = self
            .list(StatusFilter::Keep)
            .into_iter()
            .cloned()
            .collect();
        publish_sort(&mut kept);
        kept
    }

    /// Appends rows whose titles are not stored yet, first occurrence
    /// winning. Returns how many rows were added.
    pub fn append(&mut self, rows: Vec<Article>) -> Result<usize, StoreError> {
        let mut seen = self.titles();
        let fresh: Vec<Article> = rows
            .into_iter()
            .filter(|row| seen.insert(row.title.clone()))
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        let added = fresh.len();
        let mut next = self.articles.clone();
        next.extend(fresh);
        self.commit(next)?;
        Ok(added)
    }

    /// Deletes every discarded row without keeping a snapshot.
    pub fn purge_discarded(&mut self) -> Result<usize, StoreError> {
        let next: Vec<Article> = self
            .articles
            .iter()
            .filter(|a| a.review != ReviewStatus::Discard)
            .cloned()
            .collect();

        let removed = self.articles.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
            info!(removed, "purged discarded rows");
        }
        Ok(removed)
    }

    /// Stamps kept rows as `published:<volume>`, snapshots them and the
    /// discarded rows under `archive/`, then drops the discarded rows.
    ///
    /// Either everything happens or nothing does: on failure the snapshots
    /// written so far are removed and the live store is left untouched.
    pub fn archive(&mut self, volume: &str, date: NaiveDate) -> Result<ArchiveReport, StoreError> {
        let volume = validate_volume(volume)?;
        let stamp = ReviewStatus::Published(volume.clone());

        let mut published = Vec::new();
        let mut discarded = Vec::new();
        let mut next = Vec::with_capacity(self.articles.len());
        for article in &self.articles {
            match article.review {
                ReviewStatus::Keep => {
                    let mut stamped = article.clone();
                    stamped.review = stamp.clone();
                    published.push(stamped.clone());
                    next.push(stamped);
                }
                ReviewStatus::Discard => discarded.push(article.clone()),
                _ => next.push(article.clone()),
            }
        }

        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir).map_err(|e| StoreError::io(&archive_dir, e))?;

        let day = date.format("%Y-%m-%d");
        let published_snapshot = archive_dir.join(format!("{}_vol{}_published.csv", day, volume));
        let discarded_snapshot = archive_dir.join(format!("{}_vol{}_discarded.csv", day, volume));

        write_snapshot(&published_snapshot, &published)?;
        if let Err(e) = write_snapshot(&discarded_snapshot, &discarded) {
            remove_quietly(&published_snapshot);
            return Err(e);
        }
        if let Err(e) = self.commit(next) {
            remove_quietly(&published_snapshot);
            remove_quietly(&discarded_snapshot);
            return Err(e);
        }

        info!(
            volume = %volume,
            published = published.len(),
            discarded = discarded.len(),
            "archived volume"
        );

        Ok(ArchiveReport {
            volume,
            published: published.len(),
            discarded: discarded.len(),
            published_snapshot,
            discarded_snapshot,
        })
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("archive")
    }

    fn update<F>(&mut self, title: &str, mut apply: F) -> Result<(), StoreError>
    where
        F: FnMut(&mut Article),
    {
        if !self.contains_title(title) {
            return Err(StoreError::NotFound(title.to_string()));
        }

        let mut next = self.articles.clone();
        next.iter_mut().filter(|a| a.title == title).for_each(&mut apply);
        self.commit(next)
    }

    fn commit(&mut self, next: Vec<Article>) -> Result<(), StoreError> {
        write_rows_atomic(&self.path, &next)?;
        self.articles = next;
        Ok(())
    }
}

/// Manual order first (unset sorts last), then tier, then score descending.
/// Stable: rows tying on all three keep their relative order.
pub fn publish_sort(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        let order_a = a.publish_order.unwrap_or(u32::MAX);
        let order_b = b.publish_order.unwrap_or(u32::MAX);
        order_a
            .cmp(&order_b)
            .then_with(|| a.ai_tier.rank().cmp(&b.ai_tier.rank()))
            .then_with(|| b.score.total_cmp(&a.score))
    });
}

pub fn validate_volume(volume: &str) -> Result<String, StoreError> {
    let trimmed = volume.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == ".." {
        return Err(StoreError::InvalidVolume(volume.to_string()));
    }
    Ok(trimmed.to_string())
}

fn read_rows(path: &Path) -> Result<Vec<Article>, StoreError> {
    let raw = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    // Spreadsheet exports carry a UTF-8 byte order mark
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());

    reader
        .deserialize::<Article>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::csv(path, e))
}

fn write_csv<W: Write>(writer: W, rows: &[Article]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_rows_atomic(path: &Path, rows: &[Article]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
    if let Err(e) = write_csv(file, rows) {
        remove_quietly(&tmp_path);
        return Err(StoreError::csv(&tmp_path, e));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        remove_quietly(&tmp_path);
        StoreError::io(path, e)
    })
}

fn write_snapshot(path: &Path, rows: &[Article]) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StoreError::SnapshotExists(path.to_path_buf()),
            _ => StoreError::io(path, e),
        })?;

    write_csv(file, rows).map_err(|e| {
        remove_quietly(path);
        StoreError::csv(path, e)
    })
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    fn article(title: &str, review: ReviewStatus) -> Article {
        Article {
            date: date(),
            rank: 1,
            score: 50.0,
            title: title.to_string(),
            url: format!("https://news.example/{}", title),
            source: "Example News".to_string(),
            content: format!("Body of {}, with a comma and **bold**.", title),
            ai_tier: Tier::Recommend,
            ai_reason: "relevant".to_string(),
            review,
            publish_order: None,
        }
    }

    fn store_with(dir: &TempDir, rows: Vec<Article>) -> ReviewStore {
        let mut store = ReviewStore::open(dir.path().join("news_database.csv")).unwrap();
        store.append(rows).unwrap();
        store
    }

    fn titles(rows: &[Article]) -> Vec<String> {
        rows.iter().map(|a| a.title.clone()).collect()
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = ReviewStore::open(dir.path().join("absent.csv")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let mut rows = vec![article("A", ReviewStatus::Pending), article("B", ReviewStatus::Keep)];
        rows[1].publish_order = Some(2);
        rows[1].content = "line one\n\nline \"two\"".to_string();
        let store = store_with(&dir, rows.clone());

        let reopened = ReviewStore::open(store.path()).unwrap();
        assert_eq!(reopened.articles(), rows.as_slice());
    }

    #[test]
    fn test_legacy_file_is_migrated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.csv");
        let legacy = "\u{feff}收录日期,每日排名,评分,标题,链接,来源名称,原文内容,AI分类,AI理由,人工审核,发布顺序\n\
            2025-01-10,1,88,旧文章,https://a.example,法治日报,内容,强烈推荐,好,入库,3.0\n\
            2025-01-10,2.0,,空状态,,,内容二,,,,\n";
        fs::write(&path, legacy).unwrap();

        let store = ReviewStore::open(&path).unwrap();
        let rows = store.articles();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ai_tier, Tier::StrongRecommend);
        assert_eq!(rows[0].review, ReviewStatus::Keep);
        assert_eq!(rows[0].publish_order, Some(3));
        assert_eq!(rows[0].score, 88.0);
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[1].score, 0.0);
        assert_eq!(rows[1].ai_tier, Tier::Neutral);
        assert_eq!(rows[1].review, ReviewStatus::Pending);
        assert_eq!(rows[1].publish_order, None);
    }

    #[test]
    fn test_file_missing_newer_columns_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.csv");
        fs::write(&path, "date,title,content\n2025-01-10,Old,text\n").unwrap();

        let store = ReviewStore::open(&path).unwrap();
        assert_eq!(store.articles()[0].review, ReviewStatus::Pending);
        assert_eq!(store.articles()[0].ai_tier, Tier::Neutral);
    }

    #[test]
    fn test_append_skips_known_titles() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![article("A", ReviewStatus::Pending)]);

        let added = store
            .append(vec![
                article("A", ReviewStatus::Pending),
                article("B", ReviewStatus::Pending),
                article("B", ReviewStatus::Keep),
            ])
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(titles(store.articles()), vec!["A", "B"]);
        assert_eq!(store.articles()[1].review, ReviewStatus::Pending);
    }

    #[test]
    fn test_list_filters_in_store_order() {
        let dir = TempDir::new().unwrap();
        let store = store_with(
            &dir,
            vec![
                article("A", ReviewStatus::Keep),
                article("B", ReviewStatus::Pending),
                article("C", ReviewStatus::Keep),
                article("D", ReviewStatus::Published("1".into())),
            ],
        );

        let kept: Vec<&str> = store
            .list(StatusFilter::Keep)
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(kept, vec!["A", "C"]);
        assert_eq!(store.list(StatusFilter::Published).len(), 1);
        assert_eq!(store.list(StatusFilter::All).len(), 4);
    }

    #[test]
    fn test_set_status_persists_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![article("A", ReviewStatus::Pending)]);

        store.set_status("A", ReviewStatus::Keep).unwrap();
        store.set_status("A", ReviewStatus::Keep).unwrap();

        let reopened = ReviewStore::open(store.path()).unwrap();
        assert_eq!(reopened.articles()[0].review, ReviewStatus::Keep);
    }

    #[test]
    fn test_set_status_rejects_unknown_title_and_published() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![article("A", ReviewStatus::Pending)]);

        assert!(matches!(
            store.set_status("Z", ReviewStatus::Keep),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_status("A", ReviewStatus::Published("1".into())),
            Err(StoreError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_set_order_sets_and_clears() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![article("A", ReviewStatus::Keep)]);

        store.set_order("A", Some(4)).unwrap();
        assert_eq!(store.articles()[0].publish_order, Some(4));
        store.set_order("A", None).unwrap();
        assert_eq!(store.articles()[0].publish_order, None);
        assert!(matches!(store.set_order("A", Some(0)), Err(StoreError::InvalidOrder)));
    }

    #[test]
    fn test_set_tier_override_changes_publish_order() {
        let dir = TempDir::new().unwrap();
        let mut low = article("Low", ReviewStatus::Keep);
        low.ai_tier = Tier::NotRecommended;
        let mut store = store_with(&dir, vec![article("High", ReviewStatus::Keep), low]);
        assert_eq!(titles(&store.kept_in_publish_order()), vec!["High", "Low"]);

        store.set_tier("Low", Tier::StrongRecommend).unwrap();
        assert_eq!(titles(&store.kept_in_publish_order()), vec!["Low", "High"]);

        let reopened = ReviewStore::open(store.path()).unwrap();
        assert_eq!(reopened.articles()[1].ai_tier, Tier::StrongRecommend);
        assert!(matches!(
            store.set_tier("Missing", Tier::Neutral),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_publish_sort_keys() {
        let mut a = article("manual-2", ReviewStatus::Keep);
        a.publish_order = Some(2);
        let mut b = article("manual-1", ReviewStatus::Keep);
        b.publish_order = Some(1);
        b.ai_tier = Tier::NotRecommended;
        let mut c = article("strong-low", ReviewStatus::Keep);
        c.ai_tier = Tier::StrongRecommend;
        c.score = 10.0;
        let mut d = article("strong-high", ReviewStatus::Keep);
        d.ai_tier = Tier::StrongRecommend;
        d.score = 90.0;
        let e = article("recommend", ReviewStatus::Keep);

        let mut rows = vec![e, c, a, d, b];
        publish_sort(&mut rows);
        assert_eq!(
            titles(&rows),
            vec!["manual-1", "manual-2", "strong-high", "strong-low", "recommend"]
        );
    }

    #[test]
    fn test_publish_sort_is_stable_and_idempotent() {
        let rows: Vec<Article> = (0..6)
            .map(|i| article(&format!("tie-{}", i), ReviewStatus::Keep))
            .collect();

        let mut sorted = rows.clone();
        publish_sort(&mut sorted);
        assert_eq!(titles(&sorted), titles(&rows));

        let mut mixed = rows.clone();
        mixed[3].publish_order = Some(1);
        mixed[5].ai_tier = Tier::StrongRecommend;
        publish_sort(&mut mixed);
        let once = titles(&mixed);
        publish_sort(&mut mixed);
        assert_eq!(titles(&mixed), once);
        assert_eq!(once, vec!["tie-3", "tie-5", "tie-0", "tie-1", "tie-2", "tie-4"]);
    }

    #[test]
    fn test_purge_discarded() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(
            &dir,
            vec![article("A", ReviewStatus::Discard), article("B", ReviewStatus::Keep)],
        );

        assert_eq!(store.purge_discarded().unwrap(), 1);
        assert_eq!(titles(store.articles()), vec!["B"]);
        assert_eq!(store.purge_discarded().unwrap(), 0);
    }

    #[test]
    fn test_archive_moves_rows_and_writes_snapshots() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(
            &dir,
            vec![
                article("pending", ReviewStatus::Pending),
                article("kept", ReviewStatus::Keep),
                article("junk", ReviewStatus::Discard),
                article("old", ReviewStatus::Published("6".into())),
            ],
        );
        let before = store.articles().to_vec();

        let report = store.archive(" 7 ", date()).unwrap();

        assert_eq!(report.volume, "7");
        assert_eq!((report.published, report.discarded), (1, 1));
        assert!(report
            .published_snapshot
            .ends_with("archive/2025-01-10_vol7_published.csv"));

        let live = ReviewStore::open(store.path()).unwrap();
        assert_eq!(titles(live.articles()), vec!["pending", "kept", "old"]);
        assert_eq!(live.articles()[0], before[0]);
        assert_eq!(live.articles()[1].review, ReviewStatus::Published("7".into()));
        assert!(live.list(StatusFilter::Discard).is_empty());
        assert!(live.list(StatusFilter::Keep).is_empty());

        let published = ReviewStore::open(&report.published_snapshot).unwrap();
        let discarded = ReviewStore::open(&report.discarded_snapshot).unwrap();
        assert_eq!(titles(published.articles()), vec!["kept"]);
        assert_eq!(discarded.articles(), &before[2..3]);
    }

    #[test]
    fn test_archive_rejects_bad_volume_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, vec![article("kept", ReviewStatus::Keep)]);

        for volume in ["", "   ", "../7", "a\\b"] {
            assert!(matches!(
                store.archive(volume, date()),
                Err(StoreError::InvalidVolume(_))
            ));
        }
        assert!(!store.archive_dir().exists());
        assert_eq!(store.articles()[0].review, ReviewStatus::Keep);
    }

    #[test]
    fn test_archive_failure_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(
            &dir,
            vec![article("kept", ReviewStatus::Keep), article("junk", ReviewStatus::Discard)],
        );
        let before = store.articles().to_vec();

        fs::create_dir_all(store.archive_dir()).unwrap();
        let taken = store.archive_dir().join("2025-01-10_vol8_discarded.csv");
        fs::write(&taken, "occupied").unwrap();

        let result = store.archive("8", date());
        assert!(matches!(result, Err(StoreError::SnapshotExists(_))));

        assert_eq!(store.articles(), before.as_slice());
        assert_eq!(ReviewStore::open(store.path()).unwrap().articles(), before.as_slice());
        assert!(!store
            .archive_dir()
            .join("2025-01-10_vol8_published.csv")
            .exists());
        assert_eq!(fs::read_to_string(&taken).unwrap(), "occupied");
    }
}
