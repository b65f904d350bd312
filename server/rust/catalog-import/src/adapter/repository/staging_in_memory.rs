use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::staging_row::{ResolutionStatus, StagingRow};
use crate::domain::entity::unmapped_value::{UnmappedKey, UnmappedValue};
use crate::domain::repository::{ResolutionCounts, StagingRepository};
use crate::domain::value_object::PageRequest;

#[derive(Default)]
struct JobStaging {
    rows: BTreeMap<i64, StagingRow>,
    unmapped: BTreeMap<UnmappedKey, UnmappedValue>,
}

/// InMemoryStagingRepository はジョブごとのステージング領域をメモリ上に保持する。
pub struct InMemoryStagingRepository {
    jobs: RwLock<HashMap<Uuid, JobStaging>>,
}

impl InMemoryStagingRepository {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn row_count(&self, job_id: Uuid) -> usize {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map_or(0, |s| s.rows.len())
    }
}

impl Default for InMemoryStagingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StagingRepository for InMemoryStagingRepository {
    async fn insert_rows(&self, rows: &[StagingRow]) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        for row in rows {
            jobs.entry(row.job_id)
                .or_default()
                .rows
                .insert(row.row_index, row.clone());
        }
        Ok(())
    }

    async fn list_rows(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<StagingRow>, u64)> {
        let jobs = self.jobs.read().await;
        let Some(staging) = jobs.get(&job_id) else {
            return Ok((Vec::new(), 0));
        };
        let items = staging
            .rows
            .values()
            .skip(page.offset_usize())
            .take(page.limit_usize())
            .cloned()
            .collect();
        Ok((items, staging.rows.len() as u64))
    }

    async fn count_by_status(&self, job_id: Uuid) -> anyhow::Result<ResolutionCounts> {
        let mut counts = ResolutionCounts::default();
        if let Some(staging) = self.jobs.read().await.get(&job_id) {
            for row in staging.rows.values() {
                match row.resolution_status {
                    ResolutionStatus::Resolved => counts.resolved += 1,
                    ResolutionStatus::Unmapped => counts.unmapped += 1,
                    ResolutionStatus::Blocked => counts.blocked += 1,
                }
            }
        }
        Ok(counts)
    }

    async fn merge_unmapped(&self, job_id: Uuid, values: &[UnmappedValue]) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        let staging = jobs.entry(job_id).or_default();
        for value in values {
            staging
                .unmapped
                .entry(value.key())
                .and_modify(|v| v.affected_row_count += value.affected_row_count)
                .or_insert_with(|| value.clone());
        }
        Ok(())
    }

    async fn list_unmapped(&self, job_id: Uuid) -> anyhow::Result<Vec<UnmappedValue>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|s| s.unmapped.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_unmapped(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
    ) -> anyhow::Result<Option<UnmappedValue>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .and_then(|s| s.unmapped.get(key).cloned()))
    }

    async fn apply_resolution(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
        entity_id: Uuid,
    ) -> anyhow::Result<u64> {
        let mut jobs = self.jobs.write().await;
        let Some(staging) = jobs.get_mut(&job_id) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in staging.rows.values_mut() {
            if row.apply_resolution(key, entity_id) {
                updated += 1;
            }
        }
        staging.unmapped.remove(key);
        Ok(updated)
    }

    async fn purge(&self, job_id: Uuid) -> anyhow::Result<()> {
        self.jobs.write().await.remove(&job_id);
        Ok(())
    }
}
