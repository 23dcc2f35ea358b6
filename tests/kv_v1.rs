//! KV v1 behaviour against a fake Vault server

mod common;

use common::{store, FakeVault};
use ess_vault::config::KvVersion;
use ess_vault::errors::ErrorKind;
use ess_vault::secrets::{ScopedSecretName, SecretRecord};
use serde_json::json;

fn name(value: &str) -> ScopedSecretName {
    ScopedSecretName::new(value).unwrap()
}

#[tokio::test]
async fn apply_then_get_db_creds() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    let store = store();
    let config = vault.config();

    let desired = SecretRecord::new().with_field("user", "alice").with_field("pass", "s3cr3t");
    let changed = store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap();
    assert!(changed);

    let record = store.get_secret(&config, &name("db-creds")).await.unwrap();
    assert_eq!(record, desired);
    assert!(record.labels().is_none());
}

#[tokio::test]
async fn apply_is_idempotent() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    let store = store();
    let config = vault.config();
    let desired = SecretRecord::new().with_field("user", "alice");

    assert!(store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap());
    assert!(!store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap());
    assert_eq!(vault.data_writes(), 1);
}

#[tokio::test]
async fn apply_replaces_the_whole_field_map() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    vault.seed_v1("db-creds", json!({"user": "alice", "pass": "old", "host": "db.internal"}));
    let store = store();
    let config = vault.config();

    let desired = SecretRecord::new().with_field("user", "alice").with_field("pass", "new");
    assert!(store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap());

    let record = store.get_secret(&config, &name("db-creds")).await.unwrap();
    assert_eq!(record, desired);
    assert!(!record.data.contains_key("host"));
}

#[tokio::test]
async fn clearing_a_secret_leaves_an_empty_record() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    vault.seed_v1("db-creds", json!({"user": "alice"}));
    let store = store();
    let config = vault.config();

    assert!(store.apply_secret(&config, &name("db-creds"), &SecretRecord::new()).await.unwrap());

    let record = store.get_secret(&config, &name("db-creds")).await.unwrap();
    assert!(record.data.is_empty());
    assert_eq!(record, SecretRecord::new());
}

#[tokio::test]
async fn non_string_values_read_as_json_text() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    vault.seed_v1("app", json!({"port": 5432, "debug": false, "name": "api"}));

    let record = store().get_secret(&vault.config(), &name("app")).await.unwrap();
    assert_eq!(record.data["port"], b"5432");
    assert_eq!(record.data["debug"], b"false");
    assert_eq!(record.data["name"], b"api");
}

#[tokio::test]
async fn labels_are_not_stored_on_v1() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    let store = store();
    let config = vault.config();
    let desired = SecretRecord::new().with_field("user", "alice").with_label("env", "prod");

    assert!(store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap());
    assert!(!store.apply_secret(&config, &name("db-creds"), &desired).await.unwrap());

    let record = store.get_secret(&config, &name("db-creds")).await.unwrap();
    assert!(record.labels().is_none());
    assert_eq!(record.data, desired.data);
}

#[tokio::test]
async fn nested_names_map_onto_paths() {
    let vault = FakeVault::start(KvVersion::V1, "kv/team-a").await;
    let store = store();
    let config = vault.config();
    let desired = SecretRecord::new().with_field("token", "abc");

    assert!(store.apply_secret(&config, &name("apps/billing"), &desired).await.unwrap());
    assert!(vault.contains("apps/billing"));

    let paths: Vec<String> =
        vault.requests().await.iter().map(|request| request.url.path().to_string()).collect();
    assert!(paths.iter().all(|path| path == "/v1/kv/team-a/apps/billing"));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    vault.seed_v1("db-creds", json!({"user": "alice"}));
    let store = store();
    let config = vault.config();

    store.delete_keys(&config, &name("db-creds")).await.unwrap();
    store.delete_keys(&config, &name("db-creds")).await.unwrap();
    store.delete_keys(&config, &name("never-existed")).await.unwrap();

    let err = store.get_secret(&config, &name("db-creds")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn get_missing_secret_is_not_found() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;

    let err = store().get_secret(&vault.config(), &name("missing")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().starts_with("get secret 'missing'"));
}

#[tokio::test]
async fn binary_values_are_rejected_before_any_write() {
    let vault = FakeVault::start(KvVersion::V1, "secret").await;
    let desired = SecretRecord::new().with_field("blob", vec![0xff, 0xfe, 0x00]);

    let err = store().apply_secret(&vault.config(), &name("bin"), &desired).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(vault.data_writes(), 0);
}
