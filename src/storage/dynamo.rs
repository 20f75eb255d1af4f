use super::port::{BookStore, ShardQueryPort};
use crate::search::types::{AdvancedCriteria, Book, normalize_query};
use crate::sharding::CompositeShard;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes};
use std::collections::HashMap;

type Item = HashMap<String, AttributeValue>;

/// Upper bound on pages read per call, so a rare query cannot walk the whole table.
const MAX_PAGES: usize = 8;
/// BatchGetItem accepts at most this many keys per request.
const BATCH_GET_CHUNK: usize = 100;

/// Index names and table of the remote book index.
#[derive(Debug, Clone)]
pub struct DynamoTable {
    pub table_name: String,
    /// GSI keyed by `title_prefix` (one upper-case character).
    pub prefix_index: String,
    /// GSI keyed by `shard_key` (composite shard).
    pub shard_index: String,
}

/// DynamoDB-backed store.
///
/// Items carry `book_id`, `title`, `title_lower`, `title_prefix`, `shard_key` and `authors`
/// (a list of `{author_id, author_name}` maps). The client is created once and shared by
/// every concurrent shard call.
pub struct DynamoStore {
    client: Client,
    table: DynamoTable,
}

impl DynamoStore {
    pub async fn connect(table: DynamoTable) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::from_client(Client::new(&aws_config), table)
    }

    pub fn from_client(client: Client, table: DynamoTable) -> Self {
        Self { client, table }
    }

    /// Reads pages of `index` where `key_attr = key_value` until `limit` books pass `keep`.
    async fn query_index<F>(
        &self,
        index: &str,
        key_attr: &str,
        key_value: &str,
        limit: usize,
        keep: F,
    ) -> Result<Vec<Book>>
    where
        F: Fn(&Book) -> bool + Send + Sync,
    {
        let mut out = Vec::new();
        let mut start_key: Option<Item> = None;

        for _ in 0..MAX_PAGES {
            if out.len() >= limit {
                break;
            }
            let response = self
                .client
                .query()
                .table_name(&self.table.table_name)
                .index_name(index)
                .key_condition_expression(format!("{} = :key", key_attr))
                .expression_attribute_values(":key", AttributeValue::S(key_value.to_string()))
                .limit(page_size(limit, 2))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .with_context(|| format!("failed to query {} for {}", index, key_value))?;

            collect_matches(response.items(), &mut out, limit, &keep);

            match response.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => break,
            }
        }

        Ok(out)
    }

    async fn scan<F>(&self, limit: usize, keep: F) -> Result<Vec<Book>>
    where
        F: Fn(&Book) -> bool + Send + Sync,
    {
        let mut out = Vec::new();
        let mut start_key: Option<Item> = None;

        for _ in 0..MAX_PAGES {
            if out.len() >= limit {
                break;
            }
            let response = self
                .client
                .scan()
                .table_name(&self.table.table_name)
                .limit(page_size(limit, 3))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("failed to scan table")?;

            collect_matches(response.items(), &mut out, limit, &keep);

            match response.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => break,
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl ShardQueryPort for DynamoStore {
    async fn query_shard(&self, prefix: &str, query: &str, limit: usize) -> Result<Vec<Book>> {
        let prefix = prefix.to_uppercase();
        let needle = normalize_query(query);
        self.query_index(&self.table.prefix_index, "title_prefix", &prefix, limit, |book| {
            book.matches(&needle)
        })
        .await
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
        self.query_index(&self.table.shard_index, "shard_key", shard.as_str(), limit, |book| {
            book.matches(&needle)
        })
        .await
    }
}

#[async_trait]
impl BookStore for DynamoStore {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Book>> {
        let needle = normalize_query(query);
        self.scan(limit, |book| book.matches(&needle)).await
    }

    async fn search_advanced(
        &self,
        criteria: &AdvancedCriteria,
        limit: usize,
    ) -> Result<Vec<Book>> {
        self.scan(limit, |book| criteria.matches(book)).await
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table.table_name)
            .key("book_id", AttributeValue::S(book_id.to_string()))
            .send()
            .await
            .with_context(|| format!("failed to get item {}", book_id))?;

        Ok(response.item().and_then(book_from_item))
    }

    async fn get_books(&self, book_ids: &[String]) -> Result<Vec<Book>> {
        let mut out = Vec::with_capacity(book_ids.len());

        for chunk in book_ids.chunks(BATCH_GET_CHUNK) {
            let keys: Vec<Item> = chunk
                .iter()
                .map(|id| HashMap::from([("book_id".to_string(), AttributeValue::S(id.clone()))]))
                .collect();
            let request = KeysAndAttributes::builder()
                .set_keys(Some(keys))
                .build()
                .context("failed to build batch get request")?;

            let response = self
                .client
                .batch_get_item()
                .request_items(&self.table.table_name, request)
                .send()
                .await
                .context("failed to batch get items")?;

            if let Some(items) = response
                .responses()
                .and_then(|tables| tables.get(&self.table.table_name))
            {
                out.extend(items.iter().filter_map(book_from_item));
            }
            if response
                .unprocessed_keys()
                .is_some_and(|pending| !pending.is_empty())
            {
                tracing::warn!("BatchGetItem left unprocessed keys; returning partial batch");
            }
        }

        Ok(out)
    }
}

fn page_size(limit: usize, factor: usize) -> i32 {
    i32::try_from(limit.saturating_mul(factor).max(1)).unwrap_or(i32::MAX)
}

fn collect_matches<F>(items: &[Item], out: &mut Vec<Book>, limit: usize, keep: &F)
where
    F: Fn(&Book) -> bool,
{
    for book in items.iter().filter_map(book_from_item) {
        if out.len() >= limit {
            break;
        }
        if keep(&book) {
            out.push(book);
        }
    }
}

/// Decodes a stored item. Items without a `book_id` are dropped.
pub fn book_from_item(item: &Item) -> Option<Book> {
    let book_id = item.get("book_id")?.as_s().ok()?.clone();
    let title = item
        .get("title")
        .and_then(|value| value.as_s().ok())
        .cloned()
        .unwrap_or_default();
    let authors = item
        .get("authors")
        .and_then(|value| value.as_l().ok())
        .map(|entries| entries.iter().filter_map(author_name).collect())
        .unwrap_or_default();

    Some(Book::new(book_id, title, authors))
}

fn author_name(entry: &AttributeValue) -> Option<String> {
    match entry {
        AttributeValue::S(name) => Some(name.clone()),
        AttributeValue::M(fields) => fields
            .get("author_name")
            .and_then(|value| value.as_s().ok())
            .cloned(),
        _ => None,
    }
}

/// Encodes a book the way the loader writes it, including its derived keys.
pub fn item_from_book(book: &Book) -> Item {
    let authors = book
        .authors
        .iter()
        .map(|name| {
            AttributeValue::M(HashMap::from([(
                "author_name".to_string(),
                AttributeValue::S(name.clone()),
            )]))
        })
        .collect();
    let title_prefix = book.leading_char().unwrap_or_default();

    HashMap::from([
        ("book_id".to_string(), AttributeValue::S(book.book_id.clone())),
        ("title".to_string(), AttributeValue::S(book.title.clone())),
        (
            "title_lower".to_string(),
            AttributeValue::S(book.title.to_lowercase()),
        ),
        ("title_prefix".to_string(), AttributeValue::S(title_prefix)),
        (
            "shard_key".to_string(),
            AttributeValue::S(book.shard().as_str().to_string()),
        ),
        ("authors".to_string(), AttributeValue::L(authors)),
    ])
}
