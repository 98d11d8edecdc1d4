//! Core types and shared functionality for costmap.
//!
//! This crate provides:
//! - Cache store with SQLite backend and per-source TTL policy
//! - Fixed-window rate limiter
//! - ZIP to metro-area resolver over a weighted crosswalk
//! - Static state geography (FIPS, census regions, PADDs)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod ratelimit;
pub mod resolver;
pub mod store;
pub mod sweep;

pub use cache::{CachedPayload, Source};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, ErrorBody, ErrorCode};
pub use ratelimit::{RateLimitDecision, RateLimiter};
pub use resolver::{CrosswalkRecord, LocationResolver, MetroResolution};
pub use store::Store;
pub use sweep::Sweeper;
