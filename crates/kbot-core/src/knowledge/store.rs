use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{errors::Error, Result};

/// Opaque content token; equal fingerprints mean equal content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub String);

/// Backing store of the knowledge document.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn current_fingerprint(&self) -> Result<Fingerprint>;
    async fn load(&self) -> Result<String>;
}

/// One or more UTF-8 files read as a single document.
#[derive(Clone, Debug)]
pub struct FileKnowledgeStore {
    paths: Vec<PathBuf>,
}

impl FileKnowledgeStore {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::Knowledge(format!("cannot read {}: {e}", path.display())))
    }
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    async fn current_fingerprint(&self) -> Result<Fingerprint> {
        if self.paths.is_empty() {
            return Err(Error::Knowledge("no knowledge files configured".to_string()));
        }

        let mut hasher = Sha256::new();
        for path in &self.paths {
            let bytes = self.read_bytes(path).await?;
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        let digest = hasher.finalize();
        Ok(Fingerprint(
            digest.iter().map(|b| format!("{b:02x}")).collect(),
        ))
    }

    async fn load(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let bytes = self.read_bytes(path).await?;
            let text = String::from_utf8(bytes).map_err(|_| {
                Error::Knowledge(format!("{} is not valid UTF-8", path.display()))
            })?;
            parts.push(text);
        }
        Ok(parts.join("\n"))
    }
}
