//! Date-partitioned file store shared by the shipper and the collector.
//!
//! Each calendar date owns exactly one append-only partition file named
//! `log-YYYYMMDD.txt` under the store root. Listing and purging only ever
//! touch files matching that pattern; anything else placed in the root is
//! invisible to the store.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::record::date_stamp;

/// Partition file name prefix.
const PARTITION_PREFIX: &str = "log-";

/// Partition file name suffix.
const PARTITION_SUFFIX: &str = ".txt";

/// Lower bound used when a listing has no explicit start date.
/// Far enough in the past to include any real partition.
const EPOCH_STAMP: &str = "11110101";

/// Upper bound used when an enumeration must cover every partition.
const MAX_STAMP: &str = "99991231";

/// Sort order for partition listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest partition first.
    Ascending,
    /// Most recent partition first. This is the read-back default.
    Descending,
}

/// Errors that can occur during store operations.
#[derive(Debug)]
pub enum StoreError {
    /// The configured store root exists but is not a directory. Raised at
    /// construction, before any partition I/O.
    NotADirectory(PathBuf),

    /// Underlying filesystem error.
    Io(io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotADirectory(path) => {
                write!(f, "store root {} is not a directory", path.display())
            }
            StoreError::Io(e) => write!(f, "store I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// A point-in-time view of the whole buffer, taken at the start of a drain.
///
/// `lines` holds every record across all partitions in ascending partition
/// order, in-file order preserved. `partitions` names exactly the files the
/// lines came from, so a purge after a confirmed upload deletes only what
/// was actually consumed.
#[derive(Debug)]
pub struct StoreSnapshot {
    /// All buffered record lines, trailing newlines stripped.
    pub lines: Vec<String>,

    /// The partition files the lines were read from.
    pub partitions: Vec<PathBuf>,
}

impl StoreSnapshot {
    /// Check whether the snapshot holds any records.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Append-only store of date-partitioned log files.
///
/// # Example
///
/// ```no_run
/// use log_relay::store::{DateFileStore, SortOrder};
/// use chrono::NaiveDate;
///
/// #[tokio::main]
/// async fn main() {
///     let store = DateFileStore::open("logs").await.expect("store root");
///     let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
///     store.append(date, "2024-01-15 10:00:00.000000;info;started\n")
///         .await
///         .expect("append");
///
///     let lines = store
///         .list(None, None, SortOrder::Descending)
///         .await
///         .expect("list");
///     assert_eq!(lines.len(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct DateFileStore {
    /// Root directory holding the partition files.
    root: PathBuf,
}

impl DateFileStore {
    /// Open a store rooted at `root`, creating the directory if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotADirectory`] if the path already exists as
    /// a non-directory. This is checked before any partition I/O so a
    /// misconfigured root fails at construction, not on first append.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();

        match fs::metadata(&root).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(StoreError::NotADirectory(root));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&root).await?;
                debug!(root = %root.display(), "Created store root directory");
            }
            Err(e) => return Err(StoreError::Io(e)),
        }

        Ok(Self { root })
    }

    /// Get the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path of the partition file for `date`.
    ///
    /// Repeated calls with the same date always yield the same path.
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!(
            "{}{}{}",
            PARTITION_PREFIX,
            date_stamp(date),
            PARTITION_SUFFIX
        ))
    }

    /// Append one record line to the partition for `date`.
    ///
    /// The partition file is created transparently if absent and is never
    /// truncated. A terminating newline is added when the line lacks one,
    /// keeping the file strictly line-delimited.
    pub async fn append(&self, date: NaiveDate, line: &str) -> Result<(), StoreError> {
        let path = self.partition_path(date);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            file.write_all(b"\n").await?;
        }
        file.flush().await?;

        Ok(())
    }

    /// List all buffered record lines within an inclusive date range.
    ///
    /// Partitions whose 8-digit date stamp falls within `[start, end]` are
    /// sorted by filename per `order` and their lines concatenated in that
    /// file order, preserving in-file append order. Date stamps are
    /// zero-padded so lexical comparison equals chronological comparison.
    ///
    /// Defaults: `start` = a far-past epoch, `end` = today.
    pub async fn list(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        order: SortOrder,
    ) -> Result<Vec<String>, StoreError> {
        let start_stamp = start
            .map(date_stamp)
            .unwrap_or_else(|| EPOCH_STAMP.to_string());
        let end_stamp = end
            .map(date_stamp)
            .unwrap_or_else(|| date_stamp(Utc::now().date_naive()));

        let mut partitions = self.matching_partitions(&start_stamp, &end_stamp).await?;
        if order == SortOrder::Descending {
            partitions.reverse();
        }

        let mut lines = Vec::new();
        for (_, path) in &partitions {
            Self::read_lines(path, &mut lines).await?;
        }

        Ok(lines)
    }

    /// Take a snapshot of the entire buffer for a drain.
    ///
    /// All partitions are included regardless of date, in ascending
    /// (chronological) order, paired with the paths they were read from.
    pub async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let partitions = self
            .matching_partitions(EPOCH_STAMP, MAX_STAMP)
            .await?;

        let mut lines = Vec::new();
        let mut paths = Vec::with_capacity(partitions.len());
        for (_, path) in partitions {
            Self::read_lines(&path, &mut lines).await?;
            paths.push(path);
        }

        Ok(StoreSnapshot {
            lines,
            partitions: paths,
        })
    }

    /// Delete exactly the named partition files.
    ///
    /// Used after a drain confirms remote acceptance, so only the consumed
    /// snapshot is removed and nothing appended since, or placed in the
    /// root by anything else, is touched. Files already gone are ignored.
    pub async fn purge(&self, partitions: &[PathBuf]) -> Result<(), StoreError> {
        for path in partitions {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Partition already removed before purge");
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(())
    }

    /// Delete every partition file in the store root.
    ///
    /// Scoped to files matching the partition name pattern; stray files in
    /// the root are left alone. Returns the number of partitions removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let partitions = self
            .matching_partitions(EPOCH_STAMP, MAX_STAMP)
            .await?;
        let count = partitions.len();

        for (_, path) in partitions {
            fs::remove_file(path).await?;
        }

        Ok(count)
    }

    /// Check whether the store holds any partitions.
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        let partitions = self
            .matching_partitions(EPOCH_STAMP, MAX_STAMP)
            .await?;
        Ok(partitions.is_empty())
    }

    /// Enumerate partition files whose date stamp lies within the
    /// inclusive stamp range, sorted ascending by filename.
    async fn matching_partitions(
        &self,
        start_stamp: &str,
        end_stamp: &str,
    ) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut matching = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(stamp) = partition_stamp(name) else {
                continue;
            };

            if start_stamp <= stamp && stamp <= end_stamp {
                matching.push((name.to_string(), entry.path()));
            }
        }

        matching.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matching)
    }

    /// Read one partition file, pushing its lines onto `out` in order.
    async fn read_lines(path: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        let contents = fs::read_to_string(path).await?;
        for line in contents.lines() {
            out.push(line.to_string());
        }
        Ok(())
    }
}

/// Extract the 8-digit date stamp from a partition file name.
///
/// Returns `None` unless the name is exactly `log-` + 8 ASCII digits +
/// `.txt`; any other file is invisible to the store.
fn partition_stamp(name: &str) -> Option<&str> {
    let stamp = name
        .strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?;

    if stamp.len() == 8 && stamp.bytes().all(|b| b.is_ascii_digit()) {
        Some(stamp)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn open_store(dir: &tempfile::TempDir) -> DateFileStore {
        DateFileStore::open(dir.path().join("logs"))
            .await
            .expect("store should open")
    }

    #[test]
    fn test_partition_stamp_pattern() {
        assert_eq!(partition_stamp("log-20240115.txt"), Some("20240115"));
        assert_eq!(partition_stamp("log-2024011.txt"), None); // 7 digits
        assert_eq!(partition_stamp("log-202401155.txt"), None); // 9 digits
        assert_eq!(partition_stamp("log-2024011a.txt"), None);
        assert_eq!(partition_stamp("notes.txt"), None);
        assert_eq!(partition_stamp("log-20240115.log"), None);
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("logs");

        let store = DateFileStore::open(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root);
    }

    #[tokio::test]
    async fn test_open_rejects_file_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, "not a directory").unwrap();

        let result = DateFileStore::open(&root).await;
        assert!(matches!(result, Err(StoreError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_partition_path_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let d = date(2024, 1, 15);

        assert_eq!(store.partition_path(d), store.partition_path(d));
        assert!(store
            .partition_path(d)
            .ends_with("log-20240115.txt"));
    }

    #[tokio::test]
    async fn test_append_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let d = date(2024, 1, 15);
        let line = crate::record::format_message(["err", "disk full"]);

        store.append(d, &line).await.unwrap();

        let lines = store.list(None, None, SortOrder::Descending).await.unwrap();
        assert_eq!(lines, vec![line.trim_end().to_string()]);
    }

    #[tokio::test]
    async fn test_append_does_not_truncate() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let d = date(2024, 1, 15);

        store.append(d, "first\n").await.unwrap();
        store.append(d, "second\n").await.unwrap();

        let lines = store.list(None, None, SortOrder::Ascending).await.unwrap();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_list_descending_partition_order() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        // Appended out of calendar order on purpose.
        store.append(date(2024, 1, 1), "a\n").await.unwrap();
        store.append(date(2024, 1, 3), "c\n").await.unwrap();
        store.append(date(2024, 1, 2), "b\n").await.unwrap();

        let desc = store.list(None, None, SortOrder::Descending).await.unwrap();
        assert_eq!(desc, vec!["c", "b", "a"]);

        let asc = store.list(None, None, SortOrder::Ascending).await.unwrap();
        assert_eq!(asc, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_in_file_order_preserved() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let d = date(2024, 1, 2);

        store.append(d, "one\n").await.unwrap();
        store.append(d, "two\n").await.unwrap();
        store.append(d, "three\n").await.unwrap();

        let lines = store.list(None, None, SortOrder::Descending).await.unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_list_range_inclusive_bounds() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 1), "before\n").await.unwrap();
        store.append(date(2024, 1, 2), "start\n").await.unwrap();
        store.append(date(2024, 1, 3), "mid\n").await.unwrap();
        store.append(date(2024, 1, 4), "end\n").await.unwrap();
        store.append(date(2024, 1, 5), "after\n").await.unwrap();

        let lines = store
            .list(
                Some(date(2024, 1, 2)),
                Some(date(2024, 1, 4)),
                SortOrder::Ascending,
            )
            .await
            .unwrap();

        assert_eq!(lines, vec!["start", "mid", "end"]);
    }

    #[tokio::test]
    async fn test_list_range_excludes_record() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 10), "kept\n").await.unwrap();

        let excluded = store
            .list(
                Some(date(2024, 1, 11)),
                Some(date(2024, 1, 12)),
                SortOrder::Ascending,
            )
            .await
            .unwrap();
        assert!(excluded.is_empty());

        let included = store
            .list(
                Some(date(2024, 1, 10)),
                Some(date(2024, 1, 10)),
                SortOrder::Ascending,
            )
            .await
            .unwrap();
        assert_eq!(included, vec!["kept"]);
    }

    #[tokio::test]
    async fn test_stray_files_invisible() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 1), "real\n").await.unwrap();
        std::fs::write(store.root().join("notes.txt"), "stray").unwrap();
        std::fs::write(store.root().join("log-2024.txt"), "short stamp").unwrap();

        let lines = store.list(None, None, SortOrder::Descending).await.unwrap();
        assert_eq!(lines, vec!["real"]);
    }

    #[tokio::test]
    async fn test_snapshot_ascending_with_paths() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 3), "late\n").await.unwrap();
        store.append(date(2024, 1, 1), "early1\n").await.unwrap();
        store.append(date(2024, 1, 1), "early2\n").await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.lines, vec!["early1", "early2", "late"]);
        assert_eq!(snapshot.partitions.len(), 2);
        assert!(snapshot.partitions[0].ends_with("log-20240101.txt"));
        assert!(snapshot.partitions[1].ends_with("log-20240103.txt"));
    }

    #[tokio::test]
    async fn test_purge_removes_only_named_partitions() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 1), "old\n").await.unwrap();
        let snapshot = store.snapshot().await.unwrap();

        // Arrives between snapshot and purge; must survive.
        store.append(date(2024, 1, 2), "fresh\n").await.unwrap();

        store.purge(&snapshot.partitions).await.unwrap();

        let lines = store.list(None, None, SortOrder::Ascending).await.unwrap();
        assert_eq!(lines, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_purge_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let ghost = store.partition_path(date(2024, 1, 1));
        store.purge(&[ghost]).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_scoped_to_partitions() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        store.append(date(2024, 1, 1), "a\n").await.unwrap();
        store.append(date(2024, 1, 2), "b\n").await.unwrap();
        let stray = store.root().join("keep.me");
        std::fs::write(&stray, "unrelated").unwrap();

        let removed = store.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.is_empty().await.unwrap());
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn test_store_error_display() {
        let err = StoreError::NotADirectory(PathBuf::from("/tmp/x"));
        assert!(format!("{}", err).contains("not a directory"));
    }
}
