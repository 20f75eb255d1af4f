//! Shard Topology Module
//!
//! Maps books onto the composite shard layout used by the search index.
//!
//! ## Core Concepts
//! - **Composite shards**: The corpus is split by the leading letter of the title. Busy letters
//!   get their own shard, quiet letters share a grouped shard, and the three hottest letters
//!   (`A`, `S`, `T`) are split in two by a stable hash of the book id.
//! - **Fallback**: Titles that do not start with `A`-`Z` land in shard `0`.
//! - **Legacy layout**: The older one-shard-per-letter layout (`A`..`Z`) is still used by the
//!   broad fan-out search; see [`LEGACY_LETTERS`].
//!
//! Writers and readers must agree on [`resolver::resolve_shard`]: the key stored with a book
//! at write time is the key it will be looked up under.

pub mod resolver;
pub mod types;

pub use resolver::{leading_letter, letters_for, resolve_shard, shards_for_letter, stable_hash};
pub use types::{CompositeShard, LEGACY_LETTERS};
