use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entity::import_error::ImportError;
use crate::domain::value_object::PageRequest;

/// ImportErrorRepository は行単位エラーの永続化トレイト。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportErrorRepository: Send + Sync {
    async fn insert(&self, errors: &[ImportError]) -> anyhow::Result<()>;

    /// row_index 昇順（同一行内は記録順）で取得する。総件数も返す。
    async fn list(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<ImportError>, u64)>;

    /// ジョブの全エラーを取得する（エクスポート用）。
    async fn list_all(&self, job_id: Uuid) -> anyhow::Result<Vec<ImportError>>;

    /// ジョブの全エラーを削除する（検証のやり直し・致命的失敗時のリセット用）。
    async fn delete_for_job(&self, job_id: Uuid) -> anyhow::Result<()>;
}
