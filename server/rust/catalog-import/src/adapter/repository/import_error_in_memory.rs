use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::import_error::ImportError;
use crate::domain::repository::ImportErrorRepository;
use crate::domain::value_object::PageRequest;

/// InMemoryImportErrorRepository は行単位エラーのインメモリ実装。
pub struct InMemoryImportErrorRepository {
    errors: RwLock<Vec<ImportError>>,
}

impl InMemoryImportErrorRepository {
    pub fn new() -> Self {
        Self {
            errors: RwLock::new(Vec::new()),
        }
    }

    async fn sorted_for(&self, job_id: Uuid) -> Vec<ImportError> {
        let mut found: Vec<ImportError> = self
            .errors
            .read()
            .await
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect();
        // 安定ソートなので同一行内は記録順のまま
        found.sort_by_key(|e| e.row_index);
        found
    }
}

impl Default for InMemoryImportErrorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImportErrorRepository for InMemoryImportErrorRepository {
    async fn insert(&self, errors: &[ImportError]) -> anyhow::Result<()> {
        self.errors.write().await.extend_from_slice(errors);
        Ok(())
    }

    async fn list(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<ImportError>, u64)> {
        let all = self.sorted_for(job_id).await;
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(page.offset_usize())
            .take(page.limit_usize())
            .collect();
        Ok((items, total))
    }

    async fn list_all(&self, job_id: Uuid) -> anyhow::Result<Vec<ImportError>> {
        Ok(self.sorted_for(job_id).await)
    }

    async fn delete_for_job(&self, job_id: Uuid) -> anyhow::Result<()> {
        self.errors.write().await.retain(|e| e.job_id != job_id);
        Ok(())
    }
}
