//! Client-side delivery: direct send when the collector is reachable,
//! local buffering plus a reconnect drain when it is not.
//!
//! Every `log` call re-probes reachability and picks a path fresh; no
//! delivery mode is persisted. The buffered path schedules a single
//! background drainer (guarded, so repeated failures never stack drainers)
//! which polls until the collector answers, uploads the whole buffer as
//! one batch, and purges exactly the partitions it consumed only after the
//! collector confirms acceptance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::record::{self, RecordError};
use crate::sink::{RemoteSink, SendOutcome};
use crate::store::{DateFileStore, StoreError};

/// Default delay between reachability probes while draining.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Which path a `log` call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent straight to the collector. Best effort: a refusal after the
    /// successful probe is logged and dropped, not buffered.
    Direct,

    /// Appended to the local store; a drain was scheduled.
    Buffered,
}

/// Result of one drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The buffer was uploaded and purged; holds the record count.
    Flushed(usize),

    /// There was nothing to drain.
    Empty,
}

/// Errors surfaced by the shipper.
#[derive(Debug)]
pub enum ShipperError {
    /// Local store operation failed.
    Store(StoreError),

    /// A record could not be parsed for its partition date.
    Record(RecordError),

    /// Credentials could not be acquired for a drain upload.
    Credentials(AuthError),

    /// The collector did not accept a drained batch; the buffer is left
    /// intact and the drain terminates without retrying.
    BatchRefused(SendOutcome),
}

impl std::fmt::Display for ShipperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipperError::Store(e) => write!(f, "store error: {}", e),
            ShipperError::Record(e) => write!(f, "record error: {}", e),
            ShipperError::Credentials(e) => write!(f, "credentials error: {}", e),
            ShipperError::BatchRefused(outcome) => {
                write!(f, "batch upload refused: {}", outcome)
            }
        }
    }
}

impl std::error::Error for ShipperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShipperError::Store(e) => Some(e),
            ShipperError::Record(e) => Some(e),
            ShipperError::Credentials(e) => Some(e),
            ShipperError::BatchRefused(_) => None,
        }
    }
}

impl From<StoreError> for ShipperError {
    fn from(err: StoreError) -> Self {
        ShipperError::Store(err)
    }
}

impl From<RecordError> for ShipperError {
    fn from(err: RecordError) -> Self {
        ShipperError::Record(err)
    }
}

/// Counters describing shipper activity.
#[derive(Debug, Clone, Default)]
pub struct ShipperStats {
    /// Records delivered directly and accepted.
    pub direct_sent: u64,

    /// Records dropped after a refused direct send (at-most-once path).
    pub direct_dropped: u64,

    /// Records appended to the local buffer.
    pub buffered: u64,

    /// Drains that uploaded and purged the buffer.
    pub drains_completed: u64,

    /// Drains that terminated with the buffer intact.
    pub drains_failed: u64,

    /// Total records uploaded by completed drains.
    pub records_drained: u64,
}

struct ShipperInner {
    /// Local buffer. One async mutex serializes foreground appends against
    /// the drain's snapshot-upload-purge sequence.
    store: Mutex<DateFileStore>,

    /// Remote delivery boundary.
    sink: Arc<dyn RemoteSink>,

    /// Credential source, consulted at every decision point.
    tokens: Arc<dyn TokenProvider>,

    /// Delay between reachability probes while a drain waits.
    probe_interval: Duration,

    /// Guard making drain scheduling idempotent.
    drain_active: AtomicBool,

    /// Activity counters.
    stats: RwLock<ShipperStats>,
}

/// The client-side log entry point.
///
/// Cheap to clone; clones share the store, the drain guard, and the stats.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use log_relay::auth::StaticTokenProvider;
/// use log_relay::shipper::Shipper;
/// use log_relay::sink::HttpSink;
/// use log_relay::store::DateFileStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = DateFileStore::open("logs").await.expect("store root");
///     let sink = HttpSink::new("http://collector:8000", Duration::from_secs(10))
///         .expect("sink");
///     let tokens = StaticTokenProvider::new("dev-token");
///
///     let shipper = Shipper::new(store, Arc::new(sink), Arc::new(tokens));
///     shipper.log(["err", "disk full"]).await.expect("log");
/// }
/// ```
#[derive(Clone)]
pub struct Shipper {
    inner: Arc<ShipperInner>,
}

impl Shipper {
    /// Create a shipper with the default probe interval.
    pub fn new(
        store: DateFileStore,
        sink: Arc<dyn RemoteSink>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self::with_probe_interval(store, sink, tokens, DEFAULT_PROBE_INTERVAL)
    }

    /// Create a shipper with an explicit probe interval.
    pub fn with_probe_interval(
        store: DateFileStore,
        sink: Arc<dyn RemoteSink>,
        tokens: Arc<dyn TokenProvider>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ShipperInner {
                store: Mutex::new(store),
                sink,
                tokens,
                probe_interval,
                drain_active: AtomicBool::new(false),
                stats: RwLock::new(ShipperStats::default()),
            }),
        }
    }

    /// Log a batch of fields, delivering directly if the collector is
    /// reachable and buffering locally otherwise.
    ///
    /// The record is formatted once, timestamped with the current time,
    /// and that embedded timestamp keys the local partition on the
    /// buffered path.
    ///
    /// # Errors
    ///
    /// Only local failures surface here (store I/O, record formatting).
    /// Remote refusals on the direct path are logged and dropped.
    pub async fn log<I, S>(&self, fields: I) -> Result<Delivery, ShipperError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = record::format_message(fields);

        if self.inner.probe().await {
            self.inner.deliver_direct(&line).await;
            Ok(Delivery::Direct)
        } else {
            self.inner.buffer_locally(&line).await?;
            self.schedule_drain();
            Ok(Delivery::Buffered)
        }
    }

    /// Run one drain attempt right now, without waiting for reachability.
    ///
    /// The store lock is held across the snapshot, the upload, and the
    /// purge, so a foreground append can never land in a partition that is
    /// about to be deleted out from under it.
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::BatchRefused`] when the collector does not
    /// accept the batch; the buffer is left intact and no retry is
    /// scheduled here.
    pub async fn drain_now(&self) -> Result<DrainOutcome, ShipperError> {
        self.inner.drain_once().await
    }

    /// Whether a background drain is currently scheduled or running.
    pub fn drain_in_progress(&self) -> bool {
        self.inner.drain_active.load(Ordering::SeqCst)
    }

    /// Get a copy of the current activity counters.
    pub fn stats(&self) -> ShipperStats {
        self.inner
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Spawn the background drainer unless one is already active.
    fn schedule_drain(&self) {
        let won = self
            .inner
            .drain_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !won {
            debug!("Drain already in progress, not scheduling another");
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.wait_for_reachable().await;

            match inner.drain_once().await {
                Ok(DrainOutcome::Flushed(count)) => {
                    info!(records = count, "Drain completed, buffer purged");
                }
                Ok(DrainOutcome::Empty) => {
                    debug!("Drain found empty buffer");
                }
                Err(e) => {
                    error!(error = %e, "Drain failed, buffer retained");
                }
            }

            inner.drain_active.store(false, Ordering::SeqCst);
        });
    }
}

impl ShipperInner {
    /// Authenticated reachability probe. Credential acquisition failure
    /// counts as unreachable: the record is buffered rather than lost.
    async fn probe(&self) -> bool {
        let credentials = match self.tokens.credentials().await {
            Ok(creds) => creds,
            Err(e) => {
                warn!(error = %e, "Credential acquisition failed, treating collector as unreachable");
                return false;
            }
        };

        self.sink.check_reachable(&credentials).await
    }

    /// Direct path: post the record, drop it on refusal (at-most-once).
    async fn deliver_direct(&self, line: &str) {
        let outcome = match self.tokens.credentials().await {
            Ok(creds) => self.sink.post_direct(line, &creds).await,
            Err(e) => SendOutcome::TransportError(e.to_string()),
        };

        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        if outcome.is_accepted() {
            stats.direct_sent += 1;
        } else {
            stats.direct_dropped += 1;
            warn!(outcome = %outcome, "Direct send refused, record dropped");
        }
    }

    /// Buffered path: append under the record's own embedded date.
    async fn buffer_locally(&self, line: &str) -> Result<(), ShipperError> {
        let date = record::partition_date(line)?;

        let store = self.store.lock().await;
        store.append(date, line).await?;
        drop(store);

        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats.buffered += 1;
        debug!(%date, "Record buffered locally");

        Ok(())
    }

    /// Block until the collector answers a probe, sleeping a fixed
    /// interval between attempts. Unbounded by design: the drainer exists
    /// precisely to outwait an outage.
    async fn wait_for_reachable(&self) {
        loop {
            if self.probe().await {
                return;
            }
            debug!(
                interval_secs = self.probe_interval.as_secs_f64(),
                "Collector unreachable, drain waiting"
            );
            tokio::time::sleep(self.probe_interval).await;
        }
    }

    /// Snapshot, upload, purge. Purge happens only on confirmed
    /// acceptance, and deletes exactly the snapshotted partitions.
    async fn drain_once(&self) -> Result<DrainOutcome, ShipperError> {
        let store = self.store.lock().await;

        let snapshot = store.snapshot().await?;
        if snapshot.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        let payload = snapshot.lines.join("\n");
        let count = snapshot.lines.len();

        let credentials = self.tokens.credentials().await.map_err(|e| {
            self.record_drain_failure();
            ShipperError::Credentials(e)
        })?;

        let outcome = self.sink.post_batch(&payload, &credentials).await;
        if !outcome.is_accepted() {
            self.record_drain_failure();
            return Err(ShipperError::BatchRefused(outcome));
        }

        store.purge(&snapshot.partitions).await?;
        drop(store);

        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats.drains_completed += 1;
        stats.records_drained += count as u64;

        Ok(DrainOutcome::Flushed(count))
    }

    fn record_drain_failure(&self) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats.drains_failed += 1;
    }
}
