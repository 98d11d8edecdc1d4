//! SQLite persistence shared by the cache and the location resolver.

pub mod connection;
pub mod migrations;

pub use connection::Store;
