//! Inbound request bodies.
//!
//! Clients are sloppy about field spelling and types: ids arrive as
//! `accountId` or `account_id`, sometimes as a bare number. Every field is
//! coerced to a string and absent fields decode to empty, so handlers can
//! reject with one missing-field check.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    #[serde(
        default,
        rename = "accountId",
        alias = "account_id",
        deserialize_with = "flexible_string"
    )]
    pub account_id: String,
    #[serde(
        default,
        rename = "token",
        alias = "credential",
        deserialize_with = "flexible_string"
    )]
    pub credential: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(
        default,
        rename = "accountId",
        alias = "account_id",
        deserialize_with = "flexible_string"
    )]
    pub account_id: String,
    #[serde(
        default,
        rename = "token",
        alias = "credential",
        deserialize_with = "flexible_string"
    )]
    pub credential: String,
    #[serde(
        default,
        rename = "saveData",
        alias = "save_data",
        deserialize_with = "flexible_string"
    )]
    pub save_data: String,
    #[serde(
        default,
        rename = "levelData",
        alias = "level_data",
        deserialize_with = "flexible_string"
    )]
    pub level_data: String,
}

fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Flexible>::deserialize(deserializer)? {
        Some(Flexible::Text(s)) => s,
        Some(Flexible::Int(n)) => n.to_string(),
        Some(Flexible::Float(f)) => format!("{f:.0}"),
        Some(Flexible::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}
