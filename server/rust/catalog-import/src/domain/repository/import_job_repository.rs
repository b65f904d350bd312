use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};

/// ImportJobRepository はインポートジョブ永続化のためのリポジトリトレイト。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// 新しいジョブを作成する。
    async fn create(&self, job: &ImportJob) -> anyhow::Result<()>;

    /// IDでジョブを検索する（ワーカー用。テナントを問わない）。
    async fn find_by_id(&self, job_id: Uuid) -> anyhow::Result<Option<ImportJob>>;

    /// ブランドに属するジョブを検索する。他ブランドのジョブは None。
    async fn find_for_brand(&self, brand_id: Uuid, job_id: Uuid)
        -> anyhow::Result<Option<ImportJob>>;

    /// 現在の状態が `from` のいずれかである場合に限り `to` へ遷移させる（CAS）。
    /// 遷移できなかった場合は None を返す。
    async fn transition(
        &self,
        job_id: Uuid,
        from: &[ImportJobStatus],
        to: ImportJobStatus,
        error_summary: Option<String>,
    ) -> anyhow::Result<Option<ImportJob>>;

    /// 進捗カウンタを更新する。updated_at はハートビートとして更新される。
    /// 終端状態のジョブは更新しない。
    async fn update_progress(&self, job_id: Uuid, progress: &JobProgress) -> anyhow::Result<()>;

    /// 指定状態のジョブを検索する（起動時リカバリ用）。
    async fn find_by_statuses(
        &self,
        statuses: &[ImportJobStatus],
    ) -> anyhow::Result<Vec<ImportJob>>;

    /// 指定状態のまま `before` 以降更新されていないジョブを検索する（ウォッチドッグ用）。
    async fn find_stalled(
        &self,
        statuses: &[ImportJobStatus],
        before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ImportJob>>;
}
