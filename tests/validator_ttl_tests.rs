use axum::{Json, Router, routing::get};
use haven::authority::AuthorityClient;
use haven::db::VaultStorage;
use haven::service::validator::{CredentialValidator, Validation};
use serde_json::json;
use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use url::Url;

fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "haven-authority-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    path
}

async fn open_storage(path: &PathBuf) -> VaultStorage {
    let storage = VaultStorage::connect(&format!("sqlite:{}", path.display()), 5)
        .await
        .expect("failed to open test database");
    storage.init_schema().await.expect("failed to init schema");
    storage
}

/// Serve a stub authority on an ephemeral port, counting validation hits.
async fn spawn_authority(valid: bool, hits: Arc<AtomicUsize>) -> Url {
    let app = Router::new().route(
        "/v1/validation/check",
        get(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "valid": valid }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub authority");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/")).expect("bad stub url")
}

#[tokio::test]
async fn fresh_verification_skips_the_authority() {
    let path = temp_db_path("ttl");
    let storage = open_storage(&path).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_authority(true, hits.clone()).await;

    let validator = CredentialValidator::new(
        storage.clone(),
        Some(AuthorityClient::new(base, None)),
        Duration::from_secs(300),
    );

    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    // second call is served from the cached verification
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn stale_verification_contacts_the_authority_again() {
    let path = temp_db_path("stale");
    let storage = open_storage(&path).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_authority(true, hits.clone()).await;

    let validator = CredentialValidator::new(
        storage.clone(),
        Some(AuthorityClient::new(base, None)),
        Duration::ZERO,
    );

    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn rejected_credential_does_not_create_the_account() {
    let path = temp_db_path("reject");
    let storage = open_storage(&path).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_authority(false, hits.clone()).await;

    let validator = CredentialValidator::new(
        storage.clone(),
        Some(AuthorityClient::new(base, None)),
        Duration::from_secs(300),
    );

    let outcome = validator.validate("u1", "t1").await.unwrap();
    assert!(matches!(outcome, Validation::Invalid));
    assert!(storage.find_account("u1").await.unwrap().is_none());

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn unreachable_authority_is_an_error_not_a_rejection() {
    let path = temp_db_path("down");
    let storage = open_storage(&path).await;

    // grab an ephemeral port, then close it so connections are refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let base = Url::parse(&format!("http://{addr}/")).unwrap();

    let validator = CredentialValidator::new(
        storage.clone(),
        Some(AuthorityClient::new(base, None)),
        Duration::from_secs(300),
    );

    assert!(validator.validate("u1", "t1").await.is_err());
    assert!(storage.find_account("u1").await.unwrap().is_none());

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn confirmed_new_credential_rotates_the_stored_one() {
    let path = temp_db_path("rotate");
    let storage = open_storage(&path).await;
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_authority(true, hits.clone()).await;

    let validator = CredentialValidator::new(
        storage.clone(),
        Some(AuthorityClient::new(base, None)),
        Duration::from_secs(300),
    );

    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    // a different credential misses the cache and is re-verified remotely
    assert!(validator.validate("u1", "t2").await.unwrap().is_valid());
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let account = storage.find_account("u1").await.unwrap().unwrap();
    assert_eq!(account.credential, "t2");
    assert!(account.credential_verified_at.is_some());

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn without_an_authority_the_stored_credential_is_authoritative() {
    let path = temp_db_path("local");
    let storage = open_storage(&path).await;
    let validator = CredentialValidator::new(storage.clone(), None, Duration::from_secs(300));

    // first contact creates the account
    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    let account = storage.find_account("u1").await.unwrap().unwrap();
    assert_eq!(account.credential, "t1");
    assert!(account.credential_verified_at.is_none());

    // matching credential keeps working, a different one is rejected
    assert!(validator.validate("u1", "t1").await.unwrap().is_valid());
    assert!(matches!(
        validator.validate("u1", "t2").await.unwrap(),
        Validation::Invalid
    ));

    let _ = fs::remove_file(&path);
}
