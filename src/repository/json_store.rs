//! JSON file backend

use super::CredentialBackend;
use crate::{error::StoreError, models::CredentialSnapshot};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Stores `{ "roles": [...], "users": [...] }` in a single file
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialBackend for JsonFileBackend {
    async fn load(&self) -> Result<CredentialSnapshot, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Ok(CredentialSnapshot::default()),
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Credential file missing, starting empty");
                Ok(CredentialSnapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &CredentialSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(snapshot)?;

        // 先写临时文件再原子替换，避免写入中断留下半个文件
        let temp = self.temp_path();
        tokio::fs::write(&temp, &body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            roles = snapshot.roles.len(),
            users = snapshot.users.len(),
            "Credential snapshot saved"
        );
        Ok(())
    }
}
