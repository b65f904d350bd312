use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entity::staging_row::StagingRow;
use crate::domain::entity::unmapped_value::{UnmappedKey, UnmappedValue};
use crate::domain::value_object::PageRequest;

/// ResolutionCounts はジョブ内の行の解決状態別件数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionCounts {
    pub resolved: u64,
    pub unmapped: u64,
    pub blocked: u64,
}

impl ResolutionCounts {
    pub fn total(&self) -> u64 {
        self.resolved + self.unmapped + self.blocked
    }

    /// 承認を妨げる行（UNMAPPED または BLOCKED）の件数。
    pub fn blocking(&self) -> u64 {
        self.unmapped + self.blocked
    }
}

/// StagingRepository はステージング行と未解決値の永続化トレイト。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// ステージング行を一括挿入する。
    async fn insert_rows(&self, rows: &[StagingRow]) -> anyhow::Result<()>;

    /// row_index 昇順でステージング行を取得する。総件数も返す。
    async fn list_rows(
        &self,
        job_id: Uuid,
        page: &PageRequest,
    ) -> anyhow::Result<(Vec<StagingRow>, u64)>;

    /// 解決状態別の件数を返す。
    async fn count_by_status(&self, job_id: Uuid) -> anyhow::Result<ResolutionCounts>;

    /// 未解決値を登録する。既存キーには affected_row_count を加算する。
    async fn merge_unmapped(&self, job_id: Uuid, values: &[UnmappedValue]) -> anyhow::Result<()>;

    /// 未解決値の一覧を (entity_type, source_column, raw_value) 順で返す。
    async fn list_unmapped(&self, job_id: Uuid) -> anyhow::Result<Vec<UnmappedValue>>;

    async fn find_unmapped(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
    ) -> anyhow::Result<Option<UnmappedValue>>;

    /// key に一致する全行の参照へ entity_id を設定し、行の状態を再計算して
    /// 未解決値を削除する。これらは単一の原子的操作として行う。更新した行数を返す。
    async fn apply_resolution(
        &self,
        job_id: Uuid,
        key: &UnmappedKey,
        entity_id: Uuid,
    ) -> anyhow::Result<u64>;

    /// ジョブのステージング行と未解決値をすべて削除する。
    async fn purge(&self, job_id: Uuid) -> anyhow::Result<()>;
}
