use crate::error::HavenError;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Client for the remote credential authority.
pub struct AuthorityClient {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    valid: bool,
}

impl AuthorityClient {
    pub fn new(base: Url, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("haven-authority/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("FATAL: initialize authority HTTP client failed");
        Self {
            http,
            base,
            api_key,
        }
    }

    /// Ask the authority whether `credential` currently proves control of
    /// `account_id`. A definitive yes/no comes back as `Ok`; anything else
    /// (network fault, non-200, unparseable body) is an error so callers can
    /// tell "could not check" apart from "invalid".
    pub async fn verify(&self, account_id: &str, credential: &str) -> Result<bool, HavenError> {
        let url = format!(
            "{}/v1/validation/check",
            self.base.as_str().trim_end_matches('/')
        );

        let mut req = self
            .http
            .get(url)
            .query(&[("accountId", account_id), ("token", credential)]);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(%status, account_id, "authority validation returned non-success");
            return Err(HavenError::AuthorityStatus(status));
        }

        let out: ValidationResponse = resp.json().await?;
        Ok(out.valid)
    }
}
