//! SQLite-backed cache for normalized upstream payloads.
//!
//! Entries are keyed by `(source, location_key)` and carry an explicit
//! expiry derived from the source's fixed TTL. Supports:
//!
//! - Upsert writes (a second write for a key replaces the first)
//! - Fail-open reads (any failure is a miss)
//! - Invalidation by source, key, both, or everything
//! - Periodic expiry sweeps

pub mod entries;
pub mod source;

pub use entries::CachedPayload;
pub use source::Source;
