//! Database module: models, schema and pooled storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `retry.rs`: bounded retry wrapper for mutating operations
//! - `store.rs`: pooled queries and mutations

pub mod models;
pub mod retry;
pub mod schema;
pub mod store;

pub use models::{AccountRow, SaveRow, SaveSizes};
pub use schema::SQLITE_INIT;
pub use store::{SqlitePool, VaultStorage};
