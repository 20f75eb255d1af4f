use crate::sharding::{CompositeShard, resolve_shard};
use serde::{Deserialize, Serialize};

/// A book as returned by every query path.
///
/// The shard is never stored on the struct: it is always derived from the id and the title,
/// so it cannot drift from what the resolver says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Book {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            authors,
        }
    }

    pub fn shard(&self) -> CompositeShard {
        resolve_shard(&self.book_id, &self.title)
    }

    /// Case-insensitive substring match on the title or any author.
    ///
    /// `needle` must already be lower-cased (see [`normalize_query`]). An empty needle
    /// matches every book.
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty() || contains_fold(&self.title, needle) || self.author_matches(needle)
    }

    /// True when any author contains `needle` (lower-cased); empty matches all.
    pub fn author_matches(&self, needle: &str) -> bool {
        needle.is_empty() || self.authors.iter().any(|author| contains_fold(author, needle))
    }

    /// Upper-cased first character of the title, used by the one-letter layout.
    pub fn leading_char(&self) -> Option<String> {
        self.title.chars().next().map(|c| c.to_uppercase().collect())
    }
}

/// Lower-cases a raw query so it can be passed to [`Book::matches`].
pub fn normalize_query(query: &str) -> String {
    query.to_lowercase()
}

pub fn contains_fold(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Filters for the advanced search. Empty strings are wildcards.
#[derive(Debug, Clone, Default)]
pub struct AdvancedCriteria {
    pub title: String,
    pub author: String,
    /// Accepted for compatibility; not indexed yet.
    pub subjects: Vec<String>,
}

impl AdvancedCriteria {
    pub fn normalized(title: &str, author: &str, subjects: Vec<String>) -> Self {
        Self {
            title: normalize_query(title.trim()),
            author: normalize_query(author.trim()),
            subjects,
        }
    }

    pub fn matches(&self, book: &Book) -> bool {
        (self.title.is_empty() || contains_fold(&book.title, &self.title))
            && book.author_matches(&self.author)
    }
}

// --- HTTP DTOs ---

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearchRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(default)]
    pub limit: i64,
}

/// Query string of the shard routes. `limit` stays a string so malformed values fall back
/// to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ShardParams {
    pub query: Option<String>,
    pub limit: Option<String>,
    pub topology: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub count: usize,
    pub items: Vec<Book>,
}

impl SearchResponse {
    pub fn new(items: Vec<Book>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
