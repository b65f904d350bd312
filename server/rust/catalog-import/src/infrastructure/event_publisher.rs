use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::entity::import_job::{ImportJob, ImportJobStatus};

/// ImportEvent はジョブの状態・進捗の通知。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEvent {
    pub job_id: Uuid,
    pub brand_id: Uuid,
    pub status: ImportJobStatus,
    pub processed_rows: i64,
    pub total_rows: i64,
}

impl From<&ImportJob> for ImportEvent {
    fn from(job: &ImportJob) -> Self {
        Self {
            job_id: job.id,
            brand_id: job.brand_id,
            status: job.status,
            processed_rows: job.processed_rows,
            total_rows: job.total_rows,
        }
    }
}

/// ImportEventPublisher は進捗イベントの送出先。購読側はリアルタイム配信層。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportEventPublisher: Send + Sync {
    async fn publish(&self, event: ImportEvent) -> anyhow::Result<()>;
}

/// プロセス内の broadcast チャネルで配信する実装。
pub struct BroadcastImportEventPublisher {
    sender: broadcast::Sender<ImportEvent>,
}

impl BroadcastImportEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl ImportEventPublisher for BroadcastImportEventPublisher {
    async fn publish(&self, event: ImportEvent) -> anyhow::Result<()> {
        // 購読者がいない場合の送信失敗は無視する
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// 何もしない実装（テスト・購読者不要時）。
pub struct NoopImportEventPublisher;

#[async_trait]
impl ImportEventPublisher for NoopImportEventPublisher {
    async fn publish(&self, _event: ImportEvent) -> anyhow::Result<()> {
        Ok(())
    }
}
