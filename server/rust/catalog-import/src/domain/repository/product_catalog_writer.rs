use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entity::product_command::ProductCommand;

/// WriteKind は upsert の結果種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteKind {
    Created,
    Updated,
}

/// RowWriteOutcome は1行分の書き込み結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWriteOutcome {
    pub row_index: i64,
    pub kind: WriteKind,
}

/// BatchWriteError はバッチ書き込みの失敗。いずれの場合もバッチ全体は書き込まれていない。
#[derive(Debug, thiserror::Error)]
pub enum BatchWriteError {
    /// 特定の行が制約違反などで拒否された。
    #[error("row {row_index} rejected: {message}")]
    RowRejected { row_index: i64, message: String },

    /// 行を特定できない失敗。
    #[error("batch rejected: {0}")]
    Unattributed(String),

    /// 接続断などジョブ全体を継続できない失敗。
    #[error("systemic failure: {0}")]
    Systemic(#[from] anyhow::Error),
}

/// ProductCatalogWriter は商品カタログへのバッチ upsert を行う。
///
/// 1回の呼び出しはトランザクション単位であり、全行が書き込まれるか、1行も書き込まれない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalogWriter: Send + Sync {
    async fn apply_batch(
        &self,
        brand_id: Uuid,
        commands: &[ProductCommand],
    ) -> Result<Vec<RowWriteOutcome>, BatchWriteError>;
}
