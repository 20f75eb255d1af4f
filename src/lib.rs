//! Sharded Book Search Library
//!
//! Core modules of the book search service. The binary (`main.rs`) only loads
//! configuration, picks a storage backend and serves [`app::router`].
//!
//! ## Architecture Modules
//! - **`sharding`**: The composite shard layout. Maps a book to one of 17 named shards by
//!   the leading letter of its title, splitting the hottest letters in two by id hash.
//! - **`storage`**: Shard-aware book stores (in-memory and DynamoDB) behind the
//!   `ShardQueryPort` / `BookStore` traits.
//! - **`search`**: The concurrent fan-out aggregator and the search routes.
//! - **`catalog`**: Book detail and batch lookup routes.
//! - **`app`**, **`config`**, **`error`**: HTTP wiring, settings and the request error type.

pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod search;
pub mod sharding;
pub mod storage;
