use super::types::{BatchRequest, BatchResponse, BookDetail};
use crate::app::AppState;
use crate::error::{Result, SearchError};

use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use std::sync::Arc;

/// GET /books/:work_id
pub async fn handle_get_book(
    Extension(state): Extension<Arc<AppState>>,
    Path(work_id): Path<String>,
) -> Result<Json<BookDetail>> {
    if work_id.trim().is_empty() {
        return Err(SearchError::invalid("invalid_id", "work_id is required"));
    }

    match state.store.get_book(&work_id).await? {
        Some(book) => Ok(Json(BookDetail::from(book))),
        None => {
            tracing::debug!("Book {} not found", work_id);
            Err(SearchError::NotFound(work_id))
        }
    }
}

/// POST /books/batch
pub async fn handle_batch(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let req = match payload {
        Ok(Json(req)) if !req.work_ids.is_empty() => req,
        _ => return Err(SearchError::invalid("invalid_request", "work_ids is required")),
    };

    let books = state.store.get_books(&req.work_ids).await?;
    Ok(Json(BatchResponse::new(books)))
}
