//! Sharded Fan-out Aggregator
//!
//! Runs one query against every shard of a fixed layout at the same time and merges the
//! answers into a single bounded, de-duplicated result.
//!
//! ## Protocol
//! 1. **Parse**: trim and validate the query, normalize the limit.
//! 2. **Fan-out**: spawn one task per shard; every task reports into a channel sized to the
//!    shard count. The aggregator waits until each shard has reported, or until the request
//!    deadline passes.
//! 3. **Aggregate**: concatenate in arrival order, keep the first copy of each `book_id`,
//!    truncate to the limit.
//!
//! Shard failures never fail the request. They are excluded from the merge and returned as
//! [`ShardFailure`] diagnostics, so "no matches" and "every shard is down" stay distinguishable.

use super::types::Book;
use crate::error::SearchError;
use crate::sharding::{CompositeShard, LEGACY_LETTERS};
use crate::storage::port::ShardQueryPort;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Limit applied when the caller asks for zero results.
pub const DEFAULT_LIMIT: usize = 20;

/// Which shard layout a fan-out walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// One shard per letter `A`..`Z`, queried with `query_shard`.
    #[default]
    Legacy,
    /// The 17 composite shards, queried with `query_by_composite_shard`.
    Composite,
}

impl Topology {
    pub fn parse(raw: Option<&str>) -> Option<Topology> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("legacy") | Some("letters") => Some(Topology::Legacy),
            Some("composite") => Some(Topology::Composite),
            Some(_) => None,
        }
    }

    /// Shard keys addressed by this layout, in launch order.
    pub fn shards(&self) -> Vec<String> {
        match self {
            Topology::Legacy => LEGACY_LETTERS.iter().map(|c| c.to_string()).collect(),
            Topology::Composite => CompositeShard::ALL
                .iter()
                .map(|shard| shard.as_str().to_string())
                .collect(),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Legacy => f.write_str("legacy"),
            Topology::Composite => f.write_str("composite"),
        }
    }
}

/// Time bounds of a fan-out. `None` waits indefinitely.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutConfig {
    /// Budget of each shard call. A shard over budget counts as failed.
    pub shard_timeout: Option<Duration>,
    /// Budget of the whole request, measured from the start of the parse phase.
    pub deadline: Option<Duration>,
}

/// Wall-clock duration of each phase of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub parse: Duration,
    pub fanout: Duration,
    pub aggregate: Duration,
}

impl PhaseTiming {
    pub fn parse_ms(&self) -> u64 {
        as_millis(self.parse)
    }

    pub fn fanout_ms(&self) -> u64 {
        as_millis(self.fanout)
    }

    pub fn aggregate_ms(&self) -> u64 {
        as_millis(self.aggregate)
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardFailureKind {
    /// The storage call returned an error.
    Error(String),
    /// The call ran past the per-shard timeout.
    TimedOut,
    /// The shard had not reported when the request deadline passed.
    DeadlineExceeded,
    /// The task died without reporting.
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
    pub shard: String,
    pub kind: ShardFailureKind,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub items: Vec<Book>,
    pub timing: PhaseTiming,
    pub topology: Topology,
    pub shards_queried: usize,
    /// Diagnostics only; never turned into an error.
    pub failures: Vec<ShardFailure>,
}

impl FanoutReport {
    pub fn all_shards_failed(&self) -> bool {
        self.shards_queried > 0 && self.failures.len() == self.shards_queried
    }
}

struct ShardReply {
    shard: String,
    outcome: Result<Vec<Book>, ShardFailureKind>,
}

/// Aborts every shard task still running when the fan-out is dropped or finishes early.
struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Scatter/gather search over a shard layout.
///
/// Storage-agnostic: works with any [`ShardQueryPort`], including `dyn BookStore`.
pub struct FanoutAggregator<S: ?Sized> {
    store: Arc<S>,
    config: FanoutConfig,
}

impl<S: ?Sized> Clone for FanoutAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S> FanoutAggregator<S>
where
    S: ShardQueryPort + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: FanoutConfig) -> Self {
        Self { store, config }
    }

    /// Broad search over the one-letter layout (26 shards).
    pub async fn broad_search(&self, query: &str, limit: usize) -> Result<FanoutReport, SearchError> {
        self.search(query, limit, Topology::Legacy).await
    }

    /// Broad search over the composite layout (17 shards).
    pub async fn composite_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<FanoutReport, SearchError> {
        self.search(query, limit, Topology::Composite).await
    }

    /// Runs the three phases over `topology`.
    ///
    /// Fails only with [`SearchError::InvalidRequest`], before any shard is contacted.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        topology: Topology,
    ) -> Result<FanoutReport, SearchError> {
        let started = Instant::now();

        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::invalid("invalid_request", "query is required"));
        }
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        let parse_done = Instant::now();

        let span = tracing::info_span!(
            "fanout",
            request_id = %uuid::Uuid::new_v4(),
            %topology,
            limit
        );

        let report = async move {
            let shards = topology.shards();
            let deadline = self
                .config
                .deadline
                .map(|budget| tokio::time::Instant::from_std(started) + budget);

            let (gathered, failures) = self
                .scatter_gather(query, limit, topology, &shards, deadline)
                .await;
            let fanout_done = Instant::now();

            let items = merge_results(gathered, limit);
            let aggregate_done = Instant::now();

            let timing = PhaseTiming {
                parse: parse_done.duration_since(started),
                fanout: fanout_done.duration_since(parse_done),
                aggregate: aggregate_done.duration_since(fanout_done),
            };

            if failures.len() == shards.len() {
                tracing::error!("All {} shards failed; returning empty result", shards.len());
            } else if !failures.is_empty() {
                tracing::warn!(
                    "{} of {} shards failed; result may be incomplete",
                    failures.len(),
                    shards.len()
                );
            }
            tracing::info!(
                "Fan-out returned {} items (parse={}ms fanout={}ms aggregate={}ms)",
                items.len(),
                timing.parse_ms(),
                timing.fanout_ms(),
                timing.aggregate_ms()
            );

            FanoutReport {
                items,
                timing,
                topology,
                shards_queried: shards.len(),
                failures,
            }
        }
        .instrument(span)
        .await;

        Ok(report)
    }

    /// Launches every shard call, then collects replies in arrival order.
    async fn scatter_gather(
        &self,
        query: &str,
        limit: usize,
        topology: Topology,
        shards: &[String],
        deadline: Option<tokio::time::Instant>,
    ) -> (Vec<Book>, Vec<ShardFailure>) {
        let (tx, mut rx) = mpsc::channel::<ShardReply>(shards.len().max(1));
        let mut tasks = AbortOnDrop(Vec::with_capacity(shards.len()));

        for shard in shards {
            let store = Arc::clone(&self.store);
            let tx = tx.clone();
            let shard = shard.clone();
            let query = query.to_string();
            let shard_timeout = self.config.shard_timeout;

            tasks.0.push(tokio::spawn(async move {
                let call = async {
                    match topology {
                        Topology::Legacy => store.query_shard(&shard, &query, limit).await,
                        Topology::Composite => {
                            store.query_by_composite_shard(&shard, &query, limit).await
                        }
                    }
                };
                let outcome = match shard_timeout {
                    Some(budget) => match tokio::time::timeout(budget, call).await {
                        Ok(result) => result.map_err(|e| ShardFailureKind::Error(format!("{:#}", e))),
                        Err(_) => Err(ShardFailureKind::TimedOut),
                    },
                    None => call
                        .await
                        .map_err(|e| ShardFailureKind::Error(format!("{:#}", e))),
                };
                // Receiver gone means the request was abandoned.
                let _ = tx.send(ShardReply { shard, outcome }).await;
            }));
        }
        drop(tx);

        let mut pending: Vec<String> = shards.to_vec();
        let mut gathered = Vec::new();
        let mut failures = Vec::new();
        let mut deadline_hit = false;

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                    Ok(reply) => reply,
                    Err(_) => {
                        deadline_hit = true;
                        break;
                    }
                },
                None => rx.recv().await,
            };
            let Some(reply) = next else {
                break;
            };

            pending.retain(|shard| shard != &reply.shard);
            match reply.outcome {
                Ok(items) => {
                    tracing::debug!("Shard {} returned {} items", reply.shard, items.len());
                    gathered.extend(items);
                }
                Err(kind) => {
                    tracing::warn!("Shard {} excluded: {:?}", reply.shard, kind);
                    failures.push(ShardFailure {
                        shard: reply.shard,
                        kind,
                    });
                }
            }
        }

        let missing_kind = if deadline_hit {
            ShardFailureKind::DeadlineExceeded
        } else {
            ShardFailureKind::Panicked
        };
        for shard in pending {
            tracing::warn!("Shard {} never reported: {:?}", shard, missing_kind);
            failures.push(ShardFailure {
                shard,
                kind: missing_kind.clone(),
            });
        }

        drop(tasks);
        (gathered, failures)
    }
}

/// Keeps the first occurrence of each `book_id`, in input order, up to `limit` books.
pub fn merge_results<I>(books: I, limit: usize) -> Vec<Book>
where
    I: IntoIterator<Item = Book>,
{
    let mut seen: HashSet<String> = HashSet::new();
    // `limit` comes from the client; never size an allocation by it.
    let mut out = Vec::new();
    for book in books {
        if out.len() >= limit {
            break;
        }
        if seen.insert(book.book_id.clone()) {
            out.push(book);
        }
    }
    out
}
