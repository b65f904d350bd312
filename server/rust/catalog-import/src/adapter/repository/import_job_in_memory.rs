use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};
use crate::domain::repository::ImportJobRepository;

/// InMemoryImportJobRepository はデータベースなしで動かすためのインメモリ実装。
pub struct InMemoryImportJobRepository {
    jobs: RwLock<HashMap<Uuid, ImportJob>>,
}

impl InMemoryImportJobRepository {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// updated_at を過去へずらす（ウォッチドッグの検証用）。
    pub async fn backdate(&self, job_id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            job.updated_at = updated_at;
        }
    }
}

impl Default for InMemoryImportJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImportJobRepository for InMemoryImportJobRepository {
    async fn create(&self, job: &ImportJob) -> anyhow::Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn find_by_id(&self, job_id: Uuid) -> anyhow::Result<Option<ImportJob>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn find_for_brand(
        &self,
        brand_id: Uuid,
        job_id: Uuid,
    ) -> anyhow::Result<Option<ImportJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .filter(|j| j.brand_id == brand_id)
            .cloned())
    }

    async fn transition(
        &self,
        job_id: Uuid,
        from: &[ImportJobStatus],
        to: ImportJobStatus,
        error_summary: Option<String>,
    ) -> anyhow::Result<Option<ImportJob>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if !from.contains(&job.status) {
            return Ok(None);
        }
        job.transition_to(to, error_summary)?;
        Ok(Some(job.clone()))
    }

    async fn update_progress(&self, job_id: Uuid, progress: &JobProgress) -> anyhow::Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            if !job.is_terminal() {
                job.apply_progress(progress);
            }
        }
        Ok(())
    }

    async fn find_by_statuses(
        &self,
        statuses: &[ImportJobStatus],
    ) -> anyhow::Result<Vec<ImportJob>> {
        let mut found: Vec<ImportJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| statuses.contains(&j.status))
            .cloned()
            .collect();
        found.sort_by_key(|j| j.created_at);
        Ok(found)
    }

    async fn find_stalled(
        &self,
        statuses: &[ImportJobStatus],
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ImportJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| statuses.contains(&j.status) && j.updated_at < before)
            .cloned()
            .collect())
    }
}
