//! Book Detail Module
//!
//! Direct lookups of books by id, one at a time or in batches. No sharding is involved:
//! the stores key books by id independently of their shard.
//!
//! The wire name of the id on these routes is `work_id`.

pub mod handlers;
pub mod types;
