use schemafleet_secrets::{
    Secret, SecretManager, SecretsManagerConfig, json::JsonSecretManagerConfig,
};
use serde::Deserialize;
use std::path::PathBuf;

fn temp_secrets_path() -> PathBuf {
    std::env::temp_dir().join(format!("schemafleet-secrets-{}.json", uuid::Uuid::new_v4()))
}

fn json_manager(path: PathBuf) -> SecretManager {
    SecretManager::from_config(SecretsManagerConfig::Json(JsonSecretManagerConfig { path }))
}

/// Tests that a missing secrets file reads back as no secret rather
/// than an error
#[tokio::test]
async fn test_get_secret_missing_file() {
    let secrets = json_manager(temp_secrets_path());

    let value = secrets.get_secret("anything").await.unwrap();
    assert_eq!(value, None);
}

/// Tests that a stored secret can be read back
#[tokio::test]
async fn test_set_then_get_secret() {
    let path = temp_secrets_path();
    let secrets = json_manager(path.clone());

    secrets.set_secret("cluster-primary", "value").await.unwrap();

    let value = secrets.get_secret("cluster-primary").await.unwrap();
    assert_eq!(value, Some(Secret::String("value".to_string())));

    _ = std::fs::remove_file(path);
}

/// Tests that JSON valued secrets parse into typed structures
#[tokio::test]
async fn test_parsed_secret() {
    #[derive(Deserialize)]
    struct Credentials {
        username: String,
        password: String,
    }

    let path = temp_secrets_path();
    let secrets = json_manager(path.clone());

    secrets
        .set_secret(
            "cluster-primary",
            r#"{"username":"fleet","password":"hunter2"}"#,
        )
        .await
        .unwrap();

    let credentials: Credentials = secrets
        .parsed_secret("cluster-primary")
        .await
        .unwrap()
        .expect("secret should exist");

    assert_eq!(credentials.username, "fleet");
    assert_eq!(credentials.password, "hunter2");

    _ = std::fs::remove_file(path);
}

/// Tests the memory manager default fallback
#[tokio::test]
async fn test_memory_default_secret() {
    let secrets = SecretManager::from_config(SecretsManagerConfig::Memory(
        schemafleet_secrets::memory::MemorySecretManagerConfig {
            secrets: Default::default(),
            default: Some("fallback".to_string()),
        },
    ));

    let value = secrets.get_secret("unknown").await.unwrap();
    assert_eq!(value, Some(Secret::String("fallback".to_string())));
}
