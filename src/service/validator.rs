use crate::authority::AuthorityClient;
use crate::db::{AccountRow, VaultStorage};
use crate::error::HavenError;
use chrono::Utc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Outcome of a credential check. Three states: `Valid`, `Invalid`, or an
/// error ("could not check") — callers must never fold the error case into
/// a rejection recorded against the account.
#[derive(Debug, Clone)]
pub enum Validation {
    Valid(AccountRow),
    Invalid,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Validates presented credentials against the stored account row, consulting
/// the remote authority when the cached verification is stale.
///
/// Policy: accounts are created on the first successfully verified
/// credential; a later mismatch is rejected unless the authority confirms the
/// new credential, in which case the stored one is rotated. With no authority
/// configured the stored credential is authoritative, and an unknown account
/// is created on first contact (trust-on-first-use, `credential_verified_at`
/// left unset).
pub struct CredentialValidator {
    storage: VaultStorage,
    authority: Option<AuthorityClient>,
    ttl: Duration,
}

impl CredentialValidator {
    pub fn new(storage: VaultStorage, authority: Option<AuthorityClient>, ttl: Duration) -> Self {
        Self {
            storage,
            authority,
            ttl,
        }
    }

    /// Concurrent callers that both miss the freshness window both contact
    /// the authority; the duplicate remote call is idempotent and accepted.
    pub async fn validate(
        &self,
        account_id: &str,
        presented: &str,
    ) -> Result<Validation, HavenError> {
        let now = Utc::now();
        let account = self.storage.find_account(account_id).await?;

        let Some(account) = account else {
            return self.first_contact(account_id, presented).await;
        };

        let credential_matches = constant_time_eq(&account.credential, presented);

        if credential_matches {
            if let Some(verified_at) = account.credential_verified_at {
                let age = now.signed_duration_since(verified_at);
                if age >= chrono::TimeDelta::zero()
                    && age.to_std().is_ok_and(|a| a <= self.ttl)
                {
                    debug!(account_id, "credential fresh within TTL, skipping authority");
                    return Ok(Validation::Valid(account));
                }
            }
        }

        let Some(authority) = self.authority.as_ref() else {
            // No authority configured: the stored credential is authoritative.
            if credential_matches {
                return Ok(Validation::Valid(account));
            }
            warn!(account_id, "credential mismatch with no authority configured");
            return Ok(Validation::Invalid);
        };

        if !authority.verify(account_id, presented).await? {
            warn!(account_id, "authority rejected credential");
            return Ok(Validation::Invalid);
        }

        self.storage
            .record_verification(account_id, presented, Some(now), now)
            .await?;
        Ok(Validation::Valid(AccountRow {
            credential: presented.to_string(),
            credential_verified_at: Some(now),
            ..account
        }))
    }

    /// Unknown account: create it on the first credential the authority
    /// confirms (or on first contact when no authority is configured).
    async fn first_contact(
        &self,
        account_id: &str,
        presented: &str,
    ) -> Result<Validation, HavenError> {
        let now = Utc::now();
        let verified_at = match self.authority.as_ref() {
            Some(authority) => {
                if !authority.verify(account_id, presented).await? {
                    warn!(account_id, "authority rejected credential for unknown account");
                    return Ok(Validation::Invalid);
                }
                Some(now)
            }
            None => None,
        };

        self.storage
            .record_verification(account_id, presented, verified_at, now)
            .await?;
        info!(account_id, "account created on first verified credential");
        Ok(Validation::Valid(AccountRow {
            account_id: account_id.to_string(),
            credential: presented.to_string(),
            credential_verified_at: verified_at,
            is_subscriber: false,
            created_at: now,
        }))
    }
}

fn constant_time_eq(stored: &str, presented: &str) -> bool {
    bool::from(stored.as_bytes().ct_eq(presented.as_bytes()))
}
