use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRow {
    pub account_id: String,
    pub credential: String,
    pub credential_verified_at: Option<DateTime<Utc>>,
    pub is_subscriber: bool,
    pub created_at: DateTime<Utc>,
}

/// Blob columns are stored in encoded form; the size columns carry the
/// decoded byte lengths recorded at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveRow {
    pub account_id: String,
    pub save_data: String,
    pub level_data: String,
    pub save_size: i64,
    pub level_size: i64,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight projection of a saves row for quota checks and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSizes {
    pub save_size: i64,
    pub level_size: i64,
    pub updated_at: DateTime<Utc>,
}
