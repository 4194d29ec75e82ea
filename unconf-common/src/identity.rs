//! Client identity
//!
//! A locally generated, persisted token keying this client's selection
//! record in the shared store. It is not a verified identity.

use crate::db::{LocalStorage, CLIENT_ID_KEY};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Opaque per-client token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generate a fresh identity from a UUIDv4
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Load the persisted identity, generating and storing one on first use
    pub async fn load_or_create(storage: &LocalStorage) -> Result<Self> {
        if let Some(existing) = storage.get_item(CLIENT_ID_KEY).await? {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(Self(existing.to_string()));
            }
        }

        let identity = Self::generate();
        storage.set_item(CLIENT_ID_KEY, identity.as_str()).await?;
        info!("Generated client identity {}", identity);
        Ok(identity)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
