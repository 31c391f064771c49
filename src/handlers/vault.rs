//! Thin route handlers: decode the body, call the service, map the result.
//! Success bodies keep the wire shapes deployed clients already parse
//! (`"1"`, raw text, camelCase check JSON); errors go through `HavenError`.

use crate::error::HavenError;
use crate::router::HavenState;
use crate::service::validator::Validation;
use crate::types::{AccountRequest, SaveRequest};
use axum::{Json, extract::State, response::IntoResponse};

const OK_BODY: &str = "1";

fn require_identity(account_id: &str, credential: &str) -> Result<(), HavenError> {
    if account_id.is_empty() {
        return Err(HavenError::MissingField("accountId"));
    }
    if credential.is_empty() {
        return Err(HavenError::MissingField("token"));
    }
    Ok(())
}

/// POST /auth — "1" when the credential is valid for the account.
pub async fn auth(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    match state.vault.validate(&req.account_id, &req.credential).await? {
        Validation::Valid(_) => Ok(OK_BODY),
        Validation::Invalid => Err(HavenError::Unauthorized),
    }
}

/// POST /save — store one or both payloads.
pub async fn save(
    State(state): State<HavenState>,
    Json(req): Json<SaveRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    state
        .vault
        .save(
            &req.account_id,
            &req.credential,
            Some(req.save_data.as_str()),
            Some(req.level_data.as_str()),
        )
        .await?;
    Ok(OK_BODY)
}

/// POST /load — decoded save text.
pub async fn load(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    state.vault.load(&req.account_id, &req.credential).await
}

/// POST /loadlevel — decoded level text.
pub async fn load_level(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    state
        .vault
        .load_level(&req.account_id, &req.credential)
        .await
}

/// POST /delete — remove the stored blobs, keep the account.
pub async fn delete(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    state.vault.delete(&req.account_id, &req.credential).await?;
    Ok(OK_BODY)
}

/// POST /check — storage diagnostics.
pub async fn check(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    let report = state
        .vault
        .inspect(&req.account_id, &req.credential)
        .await?;
    Ok(Json(report))
}

/// POST /lastsaved — RFC3339 timestamp of the last write.
pub async fn last_saved(
    State(state): State<HavenState>,
    Json(req): Json<AccountRequest>,
) -> Result<impl IntoResponse, HavenError> {
    require_identity(&req.account_id, &req.credential)?;
    let at = state
        .vault
        .last_saved(&req.account_id, &req.credential)
        .await?;
    Ok(at.to_rfc3339())
}

/// GET / — liveness probe.
pub async fn ping() -> &'static str {
    "ok"
}
