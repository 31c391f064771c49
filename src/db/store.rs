use crate::db::models::{AccountRow, SaveRow, SaveSizes};
use crate::db::retry::with_write_retries;
use crate::db::schema::SQLITE_INIT;
use crate::error::HavenError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct VaultStorage {
    pool: SqlitePool,
}

impl VaultStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool against `database_url`, creating the file when
    /// missing. Pool size caps the number of in-flight store operations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, HavenError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_opts)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), HavenError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn find_account(&self, account_id: &str) -> Result<Option<AccountRow>, HavenError> {
        let row = sqlx::query(
            r#"SELECT account_id, credential, credential_verified_at, is_subscriber, created_at
               FROM accounts WHERE account_id = ?"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::account_row).transpose()
    }

    /// Upsert the account after a successful verification (or first-contact
    /// creation when no authority is configured). Insert when absent, else
    /// rotate `credential` and stamp `credential_verified_at`.
    pub async fn record_verification(
        &self,
        account_id: &str,
        credential: &str,
        verified_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), HavenError> {
        let verified = verified_at.map(|t| t.to_rfc3339());
        let created = now.to_rfc3339();
        with_write_retries(|| async {
            sqlx::query(
                r#"
                INSERT INTO accounts (account_id, credential, credential_verified_at, is_subscriber, created_at)
                VALUES (?, ?, ?, 0, ?)
                ON CONFLICT(account_id) DO UPDATE SET
                    credential = excluded.credential,
                    credential_verified_at = excluded.credential_verified_at
                "#,
            )
            .bind(account_id)
            .bind(credential)
            .bind(verified.as_deref())
            .bind(created.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    pub async fn find_save(&self, account_id: &str) -> Result<Option<SaveRow>, HavenError> {
        let row = sqlx::query(
            r#"SELECT account_id, save_data, level_data, save_size, level_size, updated_at
               FROM saves WHERE account_id = ?"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::save_row).transpose()
    }

    /// Sizes-only projection; quota checks must not pull blob columns.
    pub async fn find_save_sizes(&self, account_id: &str) -> Result<Option<SaveSizes>, HavenError> {
        let row = sqlx::query(
            "SELECT save_size, level_size, updated_at FROM saves WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(SaveSizes {
                save_size: r.try_get("save_size")?,
                level_size: r.try_get("level_size")?,
                updated_at: Self::parse_timestamp(r.try_get("updated_at")?)?,
            })
        })
        .transpose()
    }

    pub async fn fetch_save_blob(&self, account_id: &str) -> Result<Option<String>, HavenError> {
        let row = sqlx::query("SELECT save_data FROM saves WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get("save_data")).transpose()?)
    }

    pub async fn fetch_level_blob(&self, account_id: &str) -> Result<Option<String>, HavenError> {
        let row = sqlx::query("SELECT level_data FROM saves WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get("level_data")).transpose()?)
    }

    /// Partial upsert: only the supplied blobs (with their decoded sizes) and
    /// the timestamp are written; an absent row is created with empty
    /// defaults for the untouched field.
    pub async fn upsert_save(
        &self,
        account_id: &str,
        save: Option<(&str, i64)>,
        level: Option<(&str, i64)>,
        now: DateTime<Utc>,
    ) -> Result<(), HavenError> {
        let updated = now.to_rfc3339();
        match (save, level) {
            (Some((save_data, save_size)), Some((level_data, level_size))) => {
                with_write_retries(|| async {
                    sqlx::query(
                        r#"
                        INSERT INTO saves (account_id, save_data, save_size, level_data, level_size, updated_at)
                        VALUES (?, ?, ?, ?, ?, ?)
                        ON CONFLICT(account_id) DO UPDATE SET
                            save_data = excluded.save_data,
                            save_size = excluded.save_size,
                            level_data = excluded.level_data,
                            level_size = excluded.level_size,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(account_id)
                    .bind(save_data)
                    .bind(save_size)
                    .bind(level_data)
                    .bind(level_size)
                    .bind(updated.as_str())
                    .execute(&self.pool)
                    .await?;
                    Ok(())
                })
                .await
            }
            (Some((save_data, save_size)), None) => {
                with_write_retries(|| async {
                    sqlx::query(
                        r#"
                        INSERT INTO saves (account_id, save_data, save_size, updated_at)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT(account_id) DO UPDATE SET
                            save_data = excluded.save_data,
                            save_size = excluded.save_size,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(account_id)
                    .bind(save_data)
                    .bind(save_size)
                    .bind(updated.as_str())
                    .execute(&self.pool)
                    .await?;
                    Ok(())
                })
                .await
            }
            (None, Some((level_data, level_size))) => {
                with_write_retries(|| async {
                    sqlx::query(
                        r#"
                        INSERT INTO saves (account_id, level_data, level_size, updated_at)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT(account_id) DO UPDATE SET
                            level_data = excluded.level_data,
                            level_size = excluded.level_size,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(account_id)
                    .bind(level_data)
                    .bind(level_size)
                    .bind(updated.as_str())
                    .execute(&self.pool)
                    .await?;
                    Ok(())
                })
                .await
            }
            (None, None) => Ok(()),
        }
    }

    /// Remove the saves row only; the account survives an explicit delete.
    pub async fn delete_save(&self, account_id: &str) -> Result<bool, HavenError> {
        with_write_retries(|| async {
            let res = sqlx::query("DELETE FROM saves WHERE account_id = ?")
                .bind(account_id)
                .execute(&self.pool)
                .await?;
            Ok(res.rows_affected() > 0)
        })
        .await
    }

    /// Delete every saves row older than `cutoff` together with its owning
    /// account, in one transaction. Returns rows removed (accounts + saves).
    pub async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, HavenError> {
        let cutoff_str = cutoff.to_rfc3339();
        with_write_retries(|| async {
            let mut tx = self.pool.begin().await?;
            let accounts = sqlx::query(
                r#"DELETE FROM accounts WHERE account_id IN
                   (SELECT account_id FROM saves WHERE updated_at < ?)"#,
            )
            .bind(cutoff_str.as_str())
            .execute(&mut *tx)
            .await?;
            let saves = sqlx::query("DELETE FROM saves WHERE updated_at < ?")
                .bind(cutoff_str.as_str())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(accounts.rows_affected() + saves.rows_affected())
        })
        .await
    }

    fn account_row(row: SqliteRow) -> Result<AccountRow, HavenError> {
        let verified_at: Option<String> = row.try_get("credential_verified_at")?;
        let subscriber: i64 = row.try_get("is_subscriber")?;
        Ok(AccountRow {
            account_id: row.try_get("account_id")?,
            credential: row.try_get("credential")?,
            credential_verified_at: verified_at
                .map(|s| Self::parse_timestamp(s))
                .transpose()?,
            is_subscriber: subscriber != 0,
            created_at: Self::parse_timestamp(row.try_get("created_at")?)?,
        })
    }

    fn save_row(row: SqliteRow) -> Result<SaveRow, HavenError> {
        Ok(SaveRow {
            account_id: row.try_get("account_id")?,
            save_data: row.try_get("save_data")?,
            level_data: row.try_get("level_data")?,
            save_size: row.try_get("save_size")?,
            level_size: row.try_get("level_size")?,
            updated_at: Self::parse_timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn parse_timestamp(s: String) -> Result<DateTime<Utc>, HavenError> {
        Ok(chrono::DateTime::parse_from_rfc3339(&s)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc))
    }
}
