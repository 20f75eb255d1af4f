//! Book Storage Module
//!
//! Backends that answer shard-scoped and store-wide book queries.
//!
//! ## Core Concepts
//! - **Ports**: [`port::ShardQueryPort`] is the only capability the fan-out search needs;
//!   [`port::BookStore`] adds the store-wide and detail lookups used by the HTTP layer.
//! - **Memory backend**: [`memory::MemoryStore`] keeps books in one map per composite shard and
//!   assigns shard keys itself on insert.
//! - **DynamoDB backend**: [`dynamo::DynamoStore`] reads the remote index through its
//!   `title_prefix` and `shard_key` secondary indexes.

pub mod dynamo;
pub mod memory;
pub mod port;
pub mod seed;

pub use port::{BookStore, ShardQueryPort};
