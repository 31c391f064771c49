//! SQL DDL for initializing the vault storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema:
/// - one `accounts` row per external identity
/// - at most one `saves` row per account (`account_id` UNIQUE)
/// - `save_size`/`level_size` hold the decoded byte length of each blob,
///   recorded at write time so quota checks never decode stored data
/// - timestamps are RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_id TEXT PRIMARY KEY,
    credential TEXT NOT NULL,
    credential_verified_at TEXT NULL,
    is_subscriber INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS saves (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL UNIQUE,
    save_data TEXT NOT NULL DEFAULT '',
    level_data TEXT NOT NULL DEFAULT '',
    save_size INTEGER NOT NULL DEFAULT 0,
    level_size INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_saves_updated_at ON saves(updated_at);
"#;
