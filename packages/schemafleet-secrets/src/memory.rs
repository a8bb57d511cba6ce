//! # Memory Secret Manager
//!
//! In-memory secret manager, intended for tests and local development
//!
//! ## Environment Variables
//!
//! * `SCHEMAFLEET_SECRET_MANAGER_DEFAULT` - Optional default secret value
//! * `SCHEMAFLEET_SECRET_MANAGER_MEMORY_SECRETS` - JSON object of secrets to preload

use crate::{Secret, SecretManagerError, SecretManagerImpl};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Config for the in-memory secret manager
#[derive(Clone, Deserialize, Serialize)]
pub struct MemorySecretManagerConfig {
    /// Collection of secrets to include
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Optional default secret
    #[serde(default)]
    pub default: Option<String>,
}

/// Errors building the in-memory config from the environment
#[derive(Debug, Error)]
pub enum MemorySecretManagerConfigError {
    /// The preload secrets variable was not valid JSON
    #[error("invalid SCHEMAFLEET_SECRET_MANAGER_MEMORY_SECRETS JSON: {0}")]
    InvalidSecrets(serde_json::Error),
}

impl MemorySecretManagerConfig {
    /// Load a config from environment variables
    pub fn from_env() -> Result<Self, MemorySecretManagerConfigError> {
        let default = std::env::var("SCHEMAFLEET_SECRET_MANAGER_DEFAULT").ok();
        let secrets = match std::env::var("SCHEMAFLEET_SECRET_MANAGER_MEMORY_SECRETS") {
            Ok(secrets) => serde_json::from_str(&secrets)
                .map_err(MemorySecretManagerConfigError::InvalidSecrets)?,
            Err(_) => Default::default(),
        };

        Ok(Self { default, secrets })
    }
}

impl Debug for MemorySecretManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretManagerConfig").finish()
    }
}

/// Errors from the in-memory secret manager. The in-memory store
/// cannot actually fail, this exists to satisfy the shared error shape
#[derive(Debug, Error)]
pub enum MemorySecretError {}

/// In memory secret manager
#[derive(Default, Clone)]
pub struct MemorySecretManager {
    data: Arc<Mutex<HashMap<String, Secret>>>,
    default: Option<Secret>,
}

impl MemorySecretManager {
    /// Create a new in-memory manager preloaded with `data`
    pub fn new(data: HashMap<String, Secret>, default: Option<Secret>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            default,
        }
    }
}

impl SecretManagerImpl for MemorySecretManager {
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>, SecretManagerError> {
        if let Some(value) = self.data.lock().await.get(name) {
            return Ok(Some(value.clone()));
        }

        if let Some(value) = self.default.as_ref() {
            return Ok(Some(value.clone()));
        }

        Ok(None)
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<(), SecretManagerError> {
        self.data
            .lock()
            .await
            .insert(name.to_string(), Secret::String(value.to_string()));
        Ok(())
    }
}
