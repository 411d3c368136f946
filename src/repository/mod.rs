//! Credential storage backends
//!
//! The credential store works on an in-memory snapshot and flushes the whole
//! snapshot after each mutation; backends only load and save it.

pub mod json_store;
pub mod pg_store;

pub use json_store::JsonFileBackend;
pub use pg_store::PgBackend;

use crate::{error::StoreError, models::CredentialSnapshot};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Load everything; an uninitialized backend yields an empty snapshot
    async fn load(&self) -> Result<CredentialSnapshot, StoreError>;

    /// Replace the persisted state with `snapshot`
    async fn save(&self, snapshot: &CredentialSnapshot) -> Result<(), StoreError>;
}

/// Keeps the snapshot in process memory only
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<CredentialSnapshot>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CredentialSnapshot) -> Self {
        Self {
            data: Mutex::new(snapshot),
        }
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn load(&self) -> Result<CredentialSnapshot, StoreError> {
        Ok(self.data.lock().await.clone())
    }

    async fn save(&self, snapshot: &CredentialSnapshot) -> Result<(), StoreError> {
        *self.data.lock().await = snapshot.clone();
        Ok(())
    }
}
