use crate::codec;
use crate::db::{AccountRow, VaultStorage};
use crate::error::HavenError;
use crate::service::throttle::WriteThrottle;
use crate::service::validator::{CredentialValidator, Validation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct QuotaSettings {
    pub base_quota_bytes: u64,
    pub subscriber_quota_bytes: u64,
    pub max_save_bytes: u64,
    pub max_level_bytes: u64,
}

impl From<&crate::config::Config> for QuotaSettings {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            base_quota_bytes: cfg.base_quota_bytes,
            subscriber_quota_bytes: cfg.subscriber_quota_bytes,
            max_save_bytes: cfg.max_save_bytes,
            max_level_bytes: cfg.max_level_bytes,
        }
    }
}

/// Read-only diagnostic view of an account's storage. Field names are the
/// wire shape of the `/check` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    pub save_data: u64,
    pub level_data: u64,
    pub total_size: u64,
    pub last_saved: String,
    pub last_saved_relative: String,
    pub free_space_percentage: f64,
    pub max_data_size: u64,
}

/// The persistence core: throttle -> credential check -> quota-aware encoded
/// storage. Handlers stay thin; everything stateful is injected here once
/// per server instance.
pub struct VaultService {
    storage: VaultStorage,
    validator: CredentialValidator,
    throttle: WriteThrottle,
    quotas: QuotaSettings,
}

impl VaultService {
    pub fn new(
        storage: VaultStorage,
        validator: CredentialValidator,
        throttle: WriteThrottle,
        quotas: QuotaSettings,
    ) -> Self {
        Self {
            storage,
            validator,
            throttle,
            quotas,
        }
    }

    pub async fn validate(
        &self,
        account_id: &str,
        credential: &str,
    ) -> Result<Validation, HavenError> {
        self.validator.validate(account_id, credential).await
    }

    async fn authorize(&self, account_id: &str, credential: &str) -> Result<AccountRow, HavenError> {
        match self.validator.validate(account_id, credential).await? {
            Validation::Valid(account) => Ok(account),
            Validation::Invalid => Err(HavenError::Unauthorized),
        }
    }

    /// Store one or both payloads. Untouched fields keep their stored value
    /// and still count against the quota at their recorded size.
    pub async fn save(
        &self,
        account_id: &str,
        credential: &str,
        save: Option<&str>,
        level: Option<&str>,
    ) -> Result<(), HavenError> {
        let save = save.filter(|s| !s.is_empty());
        let level = level.filter(|s| !s.is_empty());
        if save.is_none() && level.is_none() {
            return Err(HavenError::MissingField("saveData or levelData"));
        }

        if !self.throttle.allow(account_id) {
            debug!(account_id, "save rejected by write throttle");
            return Err(HavenError::RateLimited);
        }

        // Hard per-field ceilings come before any encoding or write.
        if let Some(s) = save {
            if s.len() as u64 > self.quotas.max_save_bytes {
                return Err(HavenError::PayloadTooLarge {
                    field: "saveData",
                    limit: self.quotas.max_save_bytes,
                    size: s.len() as u64,
                });
            }
        }
        if let Some(l) = level {
            if l.len() as u64 > self.quotas.max_level_bytes {
                return Err(HavenError::PayloadTooLarge {
                    field: "levelData",
                    limit: self.quotas.max_level_bytes,
                    size: l.len() as u64,
                });
            }
        }

        let account = self.authorize(account_id, credential).await?;
        let quota = self.effective_quota(&account);

        let stored = self.storage.find_save_sizes(account_id).await?;
        let (current_save, current_level) = stored
            .map(|s| (s.save_size, s.level_size))
            .unwrap_or((0, 0));
        let proposed_save = save.map(|s| s.len() as i64).unwrap_or(current_save);
        let proposed_level = level.map(|l| l.len() as i64).unwrap_or(current_level);
        let required = (proposed_save + proposed_level) as u64;
        if required > quota {
            warn!(
                account_id,
                required, limit = quota, "combined data size exceeds storage limit"
            );
            return Err(HavenError::QuotaExceeded {
                limit: quota,
                required,
            });
        }

        let encoded_save = save.map(codec::encode).transpose()?;
        let encoded_level = level.map(codec::encode).transpose()?;
        if let (Some(raw), Some(enc)) = (save, encoded_save.as_deref()) {
            debug!(
                account_id,
                original = raw.len(),
                stored = enc.len(),
                "save data encoded"
            );
        }
        if let (Some(raw), Some(enc)) = (level, encoded_level.as_deref()) {
            debug!(
                account_id,
                original = raw.len(),
                stored = enc.len(),
                "level data encoded"
            );
        }

        self.storage
            .upsert_save(
                account_id,
                encoded_save
                    .as_deref()
                    .map(|e| (e, save.unwrap_or_default().len() as i64)),
                encoded_level
                    .as_deref()
                    .map(|e| (e, level.unwrap_or_default().len() as i64)),
                Utc::now(),
            )
            .await?;
        self.throttle.mark(account_id);
        info!(account_id, "save stored");
        Ok(())
    }

    pub async fn load(&self, account_id: &str, credential: &str) -> Result<String, HavenError> {
        self.authorize(account_id, credential).await?;
        let blob = self
            .storage
            .fetch_save_blob(account_id)
            .await?
            .filter(|b| !b.is_empty())
            .ok_or(HavenError::NotFound)?;
        codec::decode(&blob)
    }

    pub async fn load_level(
        &self,
        account_id: &str,
        credential: &str,
    ) -> Result<String, HavenError> {
        self.authorize(account_id, credential).await?;
        let blob = self
            .storage
            .fetch_level_blob(account_id)
            .await?
            .filter(|b| !b.is_empty())
            .ok_or(HavenError::NotFound)?;
        codec::decode(&blob)
    }

    /// Remove the stored blobs. The account row survives.
    pub async fn delete(&self, account_id: &str, credential: &str) -> Result<(), HavenError> {
        self.authorize(account_id, credential).await?;
        if self.storage.delete_save(account_id).await? {
            info!(account_id, "stored data deleted");
        } else {
            debug!(account_id, "delete requested but no stored data");
        }
        Ok(())
    }

    pub async fn inspect(
        &self,
        account_id: &str,
        credential: &str,
    ) -> Result<StorageReport, HavenError> {
        let account = self.authorize(account_id, credential).await?;
        let quota = self.effective_quota(&account);

        let Some(sizes) = self.storage.find_save_sizes(account_id).await? else {
            return Ok(StorageReport {
                save_data: 0,
                level_data: 0,
                total_size: 0,
                last_saved: String::new(),
                last_saved_relative: String::new(),
                free_space_percentage: 100.0,
                max_data_size: quota,
            });
        };

        let save_data = sizes.save_size.max(0) as u64;
        let level_data = sizes.level_size.max(0) as u64;
        let total_size = save_data + level_data;
        let free = quota.saturating_sub(total_size);
        Ok(StorageReport {
            save_data,
            level_data,
            total_size,
            last_saved: sizes.updated_at.to_rfc3339(),
            last_saved_relative: relative_age_label(sizes.updated_at),
            free_space_percentage: free as f64 / quota as f64 * 100.0,
            max_data_size: quota,
        })
    }

    pub async fn last_saved(
        &self,
        account_id: &str,
        credential: &str,
    ) -> Result<DateTime<Utc>, HavenError> {
        self.authorize(account_id, credential).await?;
        self.storage
            .find_save_sizes(account_id)
            .await?
            .map(|s| s.updated_at)
            .ok_or(HavenError::NotFound)
    }

    fn effective_quota(&self, account: &AccountRow) -> u64 {
        if account.is_subscriber {
            self.quotas.subscriber_quota_bytes
        } else {
            self.quotas.base_quota_bytes
        }
    }
}

/// Coarse age label by whole days.
fn relative_age_label(updated_at: DateTime<Utc>) -> String {
    let days = Utc::now().signed_duration_since(updated_at).num_days();
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "1 day ago".to_string(),
        d => format!("{d} days ago"),
    }
}
