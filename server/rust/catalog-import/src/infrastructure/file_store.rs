use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::repository::FileStore;

/// LocalFileStore はアップロード済みファイルを `{root}/{brand_id}/{file_id}` から読む。
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, brand_id: Uuid, file_id: &str) -> Option<PathBuf> {
        let valid = !file_id.is_empty()
            && !file_id.contains(['/', '\\'])
            && file_id != "."
            && file_id != "..";
        valid.then(|| self.root.join(brand_id.to_string()).join(file_id))
    }
}

async fn metadata_len(path: &Path) -> anyhow::Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn size(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<u64>> {
        match self.path_for(brand_id, file_id) {
            Some(path) => metadata_len(&path).await,
            None => Ok(None),
        }
    }

    async fn fetch(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(brand_id, file_id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
