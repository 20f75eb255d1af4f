//! Storage capabilities consumed by the search layer.
//!
//! Handlers and the fan-out aggregator only see these traits, so the in-memory store and
//! the DynamoDB store are interchangeable without touching the query code.

use crate::search::types::{AdvancedCriteria, Book};
use anyhow::Result;
use async_trait::async_trait;

/// Per-shard read access. Both calls are read-only.
#[async_trait]
pub trait ShardQueryPort: Send + Sync {
    /// Up to `limit` books whose title starts with `prefix` (one character, compared
    /// upper-cased) and that match `query`. An empty query matches every book in the shard.
    async fn query_shard(&self, prefix: &str, query: &str, limit: usize) -> Result<Vec<Book>>;

    /// Same contract, addressed by a composite shard key (`T1`, `DJK`, `0`, ...).
    ///
    /// The key is case-insensitive. An unknown key yields an empty list, not an error.
    async fn query_by_composite_shard(
        &self,
        shard_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Book>>;
}

/// Everything the HTTP layer needs from a backend.
#[async_trait]
pub trait BookStore: ShardQueryPort {
    /// Human readable backend name, used in startup logs.
    fn name(&self) -> &'static str;

    /// Store-wide substring search on title or author.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Book>>;

    async fn search_advanced(&self, criteria: &AdvancedCriteria, limit: usize)
    -> Result<Vec<Book>>;

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>>;

    /// Books for the ids that exist; unknown ids are skipped.
    async fn get_books(&self, book_ids: &[String]) -> Result<Vec<Book>>;
}
