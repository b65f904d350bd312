use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::repository::FileStore;

/// InMemoryFileStore はアップロード済みファイルをメモリ上に保持する。
pub struct InMemoryFileStore {
    files: RwLock<HashMap<(Uuid, String), Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
        }
    }

    pub async fn put(&self, brand_id: Uuid, file_id: &str, bytes: impl Into<Vec<u8>>) {
        self.files
            .write()
            .await
            .insert((brand_id, file_id.to_string()), bytes.into());
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn size(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<u64>> {
        Ok(self
            .files
            .read()
            .await
            .get(&(brand_id, file_id.to_string()))
            .map(|b| b.len() as u64))
    }

    async fn fetch(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .files
            .read()
            .await
            .get(&(brand_id, file_id.to_string()))
            .cloned())
    }
}
