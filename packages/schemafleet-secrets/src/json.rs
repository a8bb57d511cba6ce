//! # JSON Secret Manager
//!
//! Local JSON file based secrets manager, secrets are stored within a
//! local JSON file as a flat key-value map.
//!
//! Intended for self-hosted environments. Protect the file with
//! filesystem permissions; at-rest encryption is not provided here.
//!
//! ## Environment Variables
//!
//! * `SCHEMAFLEET_SECRET_MANAGER_PATH` - Path to the JSON secrets file

use crate::{Secret, SecretManagerError, SecretManagerImpl};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error;

/// Config for the JSON file secret manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonSecretManagerConfig {
    /// Path to the JSON secrets file
    pub path: PathBuf,
}

/// Errors building the JSON config from the environment
#[derive(Debug, Error)]
pub enum JsonSecretManagerConfigError {
    /// The secrets file path variable was not set
    #[error("missing SCHEMAFLEET_SECRET_MANAGER_PATH file path to access store")]
    MissingPath,
}

impl JsonSecretManagerConfig {
    /// Load a config from environment variables
    pub fn from_env() -> Result<Self, JsonSecretManagerConfigError> {
        let path = std::env::var("SCHEMAFLEET_SECRET_MANAGER_PATH")
            .map_err(|_| JsonSecretManagerConfigError::MissingPath)?;

        Ok(Self {
            path: PathBuf::from(&path),
        })
    }
}

/// Local JSON file based secret manager
#[derive(Clone)]
pub struct JsonSecretManager {
    path: PathBuf,
}

/// Temporary structure secrets are loaded into when loaded from a file
#[derive(Default, Deserialize, Serialize)]
struct SecretFile {
    /// Secrets contained within the file as key-value pairs
    secrets: HashMap<String, String>,
}

/// Errors from the JSON file secret manager
#[derive(Debug, Error)]
pub enum JsonSecretError {
    /// Failed to read the secrets file from disk
    #[error("failed to read secrets")]
    ReadFile(io::Error),
    /// Failed to write the secrets file to disk
    #[error("failed to write secrets")]
    WriteFile(io::Error),
    /// Failed to deserialize the secrets file contents
    #[error("failed to deserialize secrets")]
    Deserialize(serde_json::Error),
    /// Failed to serialize the secrets file contents
    #[error("failed to serialize secrets")]
    Serialize(serde_json::Error),
}

impl JsonSecretManager {
    /// Create the manager from its config
    pub fn from_config(config: JsonSecretManagerConfig) -> Self {
        Self { path: config.path }
    }

    async fn read_file(&self) -> Result<SecretFile, JsonSecretError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|error| {
            tracing::error!(?error, "failed to read secrets file");
            JsonSecretError::ReadFile(error)
        })?;

        let file = serde_json::from_slice(&bytes).map_err(|error| {
            tracing::error!(?error, "failed to deserialize secrets file");
            JsonSecretError::Deserialize(error)
        })?;

        Ok(file)
    }

    async fn write_file(&self, file: SecretFile) -> Result<(), JsonSecretError> {
        let bytes = serde_json::to_string(&file).map_err(|error| {
            tracing::error!(?error, "failed to serialize secrets file");
            JsonSecretError::Serialize(error)
        })?;

        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|error| {
                tracing::error!(?error, "failed to write secrets file");
                JsonSecretError::WriteFile(error)
            })?;

        Ok(())
    }
}

impl SecretManagerImpl for JsonSecretManager {
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>, SecretManagerError> {
        let file = match self.read_file().await {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };

        let secret = file.secrets.get(name);
        Ok(secret.map(|value| Secret::String(value.clone())))
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<(), SecretManagerError> {
        let mut file = if self.path.exists() {
            self.read_file().await?
        } else {
            SecretFile::default()
        };

        file.secrets.insert(name.to_string(), value.to_string());
        self.write_file(file).await?;
        Ok(())
    }
}
