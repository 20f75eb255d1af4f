use super::aggregator::{DEFAULT_LIMIT, FanoutReport, Topology};
use super::types::{AdvancedCriteria, AdvancedSearchRequest, SearchRequest, SearchResponse, ShardParams};
use crate::app::AppState;
use crate::error::{Result, SearchError};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;

pub const HEADER_PHASE_PARSE: &str = "x-phase-parse";
pub const HEADER_PHASE_FANOUT: &str = "x-phase-fanout";
pub const HEADER_PHASE_AGGREGATE: &str = "x-phase-aggregate";
pub const HEADER_SHARDS_QUERIED: &str = "x-shards-queried";
pub const HEADER_SHARDS_FAILED: &str = "x-shards-failed";

/// `limit <= 0` in a JSON body means "use the default".
pub fn default_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        usize::try_from(limit).unwrap_or(DEFAULT_LIMIT)
    }
}

/// Parses a `limit` query parameter: decimal digits only, anything else (or zero) falls
/// back to `default`.
pub fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    let mut n: usize = 0;
    for c in raw.chars() {
        let Some(digit) = c.to_digit(10) else {
            return default;
        };
        n = match n.checked_mul(10).and_then(|n| n.checked_add(digit as usize)) {
            Some(n) => n,
            None => return default,
        };
    }
    if n == 0 { default } else { n }
}

/// POST /search
pub async fn handle_search(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>> {
    let req = match payload {
        Ok(Json(req)) if !req.query.trim().is_empty() => req,
        _ => return Err(SearchError::invalid("invalid_request", "query is required")),
    };

    let items = state.store.search(&req.query, default_limit(req.limit)).await?;
    tracing::debug!("Search {:?} returned {} items", req.query, items.len());
    Ok(Json(SearchResponse::new(items)))
}

/// POST /search/advanced
pub async fn handle_advanced(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<AdvancedSearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>> {
    let Ok(Json(req)) = payload else {
        return Err(SearchError::invalid("invalid_request", "bad json"));
    };

    let criteria = AdvancedCriteria::normalized(&req.title, &req.author, req.subject);
    let items = state
        .store
        .search_advanced(&criteria, default_limit(req.limit))
        .await?;
    Ok(Json(SearchResponse::new(items)))
}

/// GET /search/shard/:prefix
///
/// One shard of the one-letter layout.
pub async fn handle_shard(
    Extension(state): Extension<Arc<AppState>>,
    Path(prefix): Path<String>,
    Query(params): Query<ShardParams>,
) -> Result<Json<SearchResponse>> {
    if prefix.chars().count() != 1 {
        return Err(SearchError::invalid(
            "invalid_prefix",
            "prefix must be a single letter",
        ));
    }
    let query = params.query.unwrap_or_default();
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIMIT);

    let items = state.store.query_shard(&prefix, &query, limit).await?;
    Ok(Json(SearchResponse::new(items)))
}

/// GET /search/composite/:shard
///
/// Point lookup on one composite shard, bypassing the fan-out. Unknown keys yield an
/// empty list.
pub async fn handle_composite_shard(
    Extension(state): Extension<Arc<AppState>>,
    Path(shard_key): Path<String>,
    Query(params): Query<ShardParams>,
) -> Result<Json<SearchResponse>> {
    if shard_key.trim().is_empty() {
        return Err(SearchError::invalid("invalid_shard", "shard key required"));
    }
    let query = params.query.unwrap_or_default();
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIMIT);

    let items = state
        .store
        .query_by_composite_shard(&shard_key, &query, limit)
        .await?;
    Ok(Json(SearchResponse::new(items)))
}

/// GET /search/sharded?query=...&limit=...&topology=legacy|composite
///
/// Fans out to every shard and reports phase timings (ms) and shard health in headers.
pub async fn handle_sharded(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ShardParams>,
) -> Result<Response> {
    let Some(topology) = Topology::parse(params.topology.as_deref()) else {
        return Err(SearchError::invalid(
            "invalid_topology",
            "topology must be legacy or composite",
        ));
    };
    let query = params.query.unwrap_or_default();
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIMIT);

    let report = state.aggregator.search(&query, limit, topology).await?;

    let headers = report_headers(&report);
    Ok((headers, Json(SearchResponse::new(report.items))).into_response())
}

fn report_headers(report: &FanoutReport) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let values = [
        (HEADER_PHASE_PARSE, report.timing.parse_ms()),
        (HEADER_PHASE_FANOUT, report.timing.fanout_ms()),
        (HEADER_PHASE_AGGREGATE, report.timing.aggregate_ms()),
        (HEADER_SHARDS_QUERIED, report.shards_queried as u64),
        (HEADER_SHARDS_FAILED, report.failures.len() as u64),
    ];
    for (name, value) in values {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
    headers
}
