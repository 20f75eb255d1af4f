//! Search Service Module
//!
//! Answers book queries against the sharded store.
//!
//! ## Overview
//! Most routes are a single storage call. The interesting one is the broad sharded search:
//! it fans a query out to every shard concurrently, tolerates failed shards and merges the
//! answers into one bounded, de-duplicated list with per-phase timings.
//!
//! ## Submodules
//! - **`aggregator`**: The fan-out/merge engine.
//! - **`handlers`**: HTTP request handlers for the Axum web server.
//! - **`types`**: The `Book` record, the match predicate and the API DTOs.

pub mod aggregator;
pub mod handlers;
pub mod types;

#[cfg(test)]
mod tests;
