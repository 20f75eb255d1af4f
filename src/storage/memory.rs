use super::port::{BookStore, ShardQueryPort};
use crate::search::types::{AdvancedCriteria, Book, normalize_query};
use crate::sharding::{CompositeShard, leading_letter, shards_for_letter};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct StoredBook {
    seq: u64,
    book: Book,
}

/// In-memory book store partitioned by composite shard.
///
/// Each shard is its own map, so a shard lookup only scans the books it owns. Results come
/// back in insertion order.
pub struct MemoryStore {
    local_data: DashMap<CompositeShard, DashMap<String, StoredBook>>,
    /// book_id -> shard currently holding it.
    placement: DashMap<String, CompositeShard>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            local_data: DashMap::new(),
            placement: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Store preloaded with the four demo books used for local runs.
    pub fn with_sample_books() -> Self {
        let store = Self::new();
        for book in sample_books() {
            store.insert(book);
        }
        store
    }

    /// Inserts or replaces a book, placing it on the shard the resolver picks.
    ///
    /// A retitled book moves to its new shard.
    pub fn insert(&self, book: Book) -> CompositeShard {
        let shard = book.shard();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.placement.insert(book.book_id.clone(), shard)
            && previous != shard
            && let Some(old_partition) = self.local_data.get(&previous)
        {
            old_partition.remove(&book.book_id);
            tracing::debug!("Moved {} from shard {} to {}", book.book_id, previous, shard);
        }

        let partition = self.local_data.entry(shard).or_default();
        partition.insert(book.book_id.clone(), StoredBook { seq, book });
        shard
    }

    pub fn len(&self) -> usize {
        self.placement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placement.is_empty()
    }

    pub fn shard_len(&self, shard: CompositeShard) -> usize {
        self.local_data
            .get(&shard)
            .map(|partition| partition.len())
            .unwrap_or(0)
    }

    fn get_local(&self, book_id: &str) -> Option<Book> {
        let shard = *self.placement.get(book_id)?;
        let partition = self.local_data.get(&shard)?;
        let stored = partition.get(book_id)?;
        Some(stored.book.clone())
    }

    /// Books on `shards` accepted by `keep`, in insertion order, capped at `limit`.
    fn collect<F>(&self, shards: &[CompositeShard], limit: usize, keep: F) -> Vec<Book>
    where
        F: Fn(&Book) -> bool,
    {
        let mut hits: Vec<(u64, Book)> = Vec::new();
        for shard in shards {
            if let Some(partition) = self.local_data.get(shard) {
                for entry in partition.iter() {
                    if keep(&entry.value().book) {
                        hits.push((entry.value().seq, entry.value().book.clone()));
                    }
                }
            }
        }
        hits.sort_by_key(|(seq, _)| *seq);
        hits.into_iter().take(limit).map(|(_, book)| book).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardQueryPort for MemoryStore {
    async fn query_shard(&self, prefix: &str, query: &str, limit: usize) -> Result<Vec<Book>> {
        let prefix = prefix.to_uppercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        // Upper-casing may expand (`ß` -> `SS`); only a single ASCII letter maps to a
        // lettered shard, anything else was resolved to the fallback.
        let shards = match leading_letter(&prefix) {
            Some(letter) if prefix.len() == 1 => shards_for_letter(letter),
            _ => vec![CompositeShard::Fallback],
        };
        let needle = normalize_query(query);

        Ok(self.collect(&shards, limit, |book| {
            book.leading_char().as_deref() == Some(prefix.as_str()) && book.matches(&needle)
        }))
    }

    async fn query_by_composite_shard(
        &self,
        shard_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Book>> {
        let Ok(shard) = shard_key.parse::<CompositeShard>() else {
            tracing::debug!("Unknown composite shard {:?}, returning empty", shard_key);
            return Ok(Vec::new());
        };
        let needle = normalize_query(query);

        Ok(self.collect(&[shard], limit, |book| book.matches(&needle)))
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Book>> {
        let needle = normalize_query(query);
        Ok(self.collect(&CompositeShard::ALL, limit, |book| book.matches(&needle)))
    }

    async fn search_advanced(
        &self,
        criteria: &AdvancedCriteria,
        limit: usize,
    ) -> Result<Vec<Book>> {
        Ok(self.collect(&CompositeShard::ALL, limit, |book| criteria.matches(book)))
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>> {
        Ok(self.get_local(book_id))
    }

    async fn get_books(&self, book_ids: &[String]) -> Result<Vec<Book>> {
        Ok(book_ids
            .iter()
            .filter_map(|book_id| self.get_local(book_id))
            .collect())
    }
}

pub fn sample_books() -> Vec<Book> {
    vec![
        Book::new(
            "OL1000046W",
            "The Great Gatsby",
            vec!["F. Scott Fitzgerald".to_string()],
        ),
        Book::new(
            "OL2000001W",
            "Harry Potter and the Sorcerer's Stone",
            vec!["J.K. Rowling".to_string()],
        ),
        Book::new(
            "OL3000002W",
            "Hamlet",
            vec!["William Shakespeare".to_string()],
        ),
        Book::new(
            "OL4000003W",
            "Clean Architecture",
            vec!["Robert C. Martin".to_string()],
        ),
    ]
}
