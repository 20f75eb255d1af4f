//! JSONL seeding for the in-memory store.
//!
//! Accepts the same export format the index loader consumes: one JSON object per line,
//! identified by `book_id` (or the older `key`), with authors given either as plain names
//! or as `{"author_id", "author_name"}` objects. Malformed lines are skipped with a warning.

use super::memory::MemoryStore;
use crate::search::types::Book;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorEntry {
    Name(String),
    Record {
        #[serde(default)]
        author_name: String,
    },
}

#[derive(Debug, Deserialize)]
struct BookLine {
    #[serde(alias = "key")]
    book_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<AuthorEntry>,
}

impl BookLine {
    fn into_book(self) -> Option<Book> {
        let book_id = self.book_id.filter(|id| !id.is_empty())?;
        let authors = self
            .authors
            .into_iter()
            .map(|author| match author {
                AuthorEntry::Name(name) => name,
                AuthorEntry::Record { author_name } => author_name,
            })
            .filter(|name| !name.is_empty())
            .collect();
        Some(Book::new(book_id, self.title, authors))
    }
}

/// Parses JSONL text into books, skipping blank and malformed lines.
pub fn parse_jsonl(contents: &str) -> Vec<Book> {
    let mut books = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BookLine>(line) {
            Ok(parsed) => match parsed.into_book() {
                Some(book) => books.push(book),
                None => tracing::warn!("Line {}: skipping item without book_id/key", line_num + 1),
            },
            Err(e) => tracing::warn!("Line {}: JSON decode error: {}", line_num + 1, e),
        }
    }
    books
}

/// Loads a JSONL file into `store`, returning how many books were inserted.
pub async fn load_jsonl(store: &MemoryStore, path: &Path) -> Result<usize> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;

    let books = parse_jsonl(&contents);
    let total = books.len();
    for book in books {
        store.insert(book);
    }
    tracing::info!("Loaded {} books from {}", total, path.display());
    Ok(total)
}
