//! HTTP wiring shared by the binary and the integration tests.

use crate::catalog::handlers::{handle_batch, handle_get_book};
use crate::search::aggregator::{FanoutAggregator, FanoutConfig};
use crate::search::handlers::{
    handle_advanced, handle_composite_shard, handle_search, handle_shard, handle_sharded,
};
use crate::storage::BookStore;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;

/// Process-wide state handed to every handler.
pub struct AppState {
    pub store: Arc<dyn BookStore>,
    pub aggregator: FanoutAggregator<dyn BookStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn BookStore>, config: FanoutConfig) -> Arc<Self> {
        let aggregator = FanoutAggregator::new(Arc::clone(&store), config);
        Arc::new(Self { store, aggregator })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/search", post(handle_search))
        .route("/search/advanced", post(handle_advanced))
        .route("/search/shard/:prefix", get(handle_shard))
        .route("/search/composite/:shard", get(handle_composite_shard))
        .route("/search/sharded", get(handle_sharded))
        .route("/books/batch", post(handle_batch))
        .route("/books/:work_id", get(handle_get_book))
        .layer(Extension(state))
}
