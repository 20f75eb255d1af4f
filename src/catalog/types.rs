use crate::search::types::Book;
use serde::{Deserialize, Serialize};

/// A book as served by the detail routes. The detail API names the id `work_id`, both in
/// the batch request and in every returned book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetail {
    pub work_id: String,
    pub title: String,
    pub authors: Vec<String>,
}

impl From<Book> for BookDetail {
    fn from(book: Book) -> Self {
        Self {
            work_id: book.book_id,
            title: book.title,
            authors: book.authors,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub work_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub count: usize,
    pub items: Vec<BookDetail>,
}

impl BatchResponse {
    pub fn new(books: Vec<Book>) -> Self {
        let items: Vec<BookDetail> = books.into_iter().map(BookDetail::from).collect();
        Self {
            count: items.len(),
            items,
        }
    }
}
