use std::sync::Arc;

use tracing::warn;

use crate::domain::entity::import_job::{ImportJob, ImportJobStatus, JobProgress};
use crate::infrastructure::event_publisher::{ImportEvent, ImportEventPublisher};
use crate::infrastructure::metrics::ImportMetrics;

/// JobNotifier はジョブの状態変化と進捗をイベントとメトリクスへ反映する。
pub struct JobNotifier {
    events: Arc<dyn ImportEventPublisher>,
    metrics: Arc<ImportMetrics>,
}

impl JobNotifier {
    pub fn new(events: Arc<dyn ImportEventPublisher>, metrics: Arc<ImportMetrics>) -> Self {
        Self { events, metrics }
    }

    pub fn metrics(&self) -> &ImportMetrics {
        &self.metrics
    }

    /// 状態遷移を通知する。VALIDATED と終端状態はジョブ数メトリクスに計上する。
    pub async fn status_changed(&self, job: &ImportJob) {
        if job.status == ImportJobStatus::Validated || job.is_terminal() {
            self.metrics.record_job_status(&job.status.to_string());
        }
        self.send(ImportEvent::from(job)).await;
    }

    /// チャンク・バッチ完了ごとの進捗を通知する。
    pub async fn progress(&self, job: &ImportJob, progress: &JobProgress) {
        let mut event = ImportEvent::from(job);
        event.processed_rows = progress.processed_rows.min(progress.total_rows);
        event.total_rows = progress.total_rows;
        self.send(event).await;
    }

    async fn send(&self, event: ImportEvent) {
        let job_id = event.job_id;
        if let Err(e) = self.events.publish(event).await {
            warn!(job_id = %job_id, error = %e, "failed to publish import event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_publisher::MockImportEventPublisher;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_progress_event_carries_counters() {
        let mut events = MockImportEventPublisher::new();
        events
            .expect_publish()
            .withf(|e| e.processed_rows == 5 && e.total_rows == 5)
            .times(1)
            .returning(|_| Ok(()));
        let notifier = JobNotifier::new(Arc::new(events), Arc::new(ImportMetrics::new("test")));
        let job = ImportJob::new(Uuid::new_v4(), "f".to_string(), "a.csv".to_string());
        notifier
            .progress(
                &job,
                &JobProgress {
                    total_rows: 5,
                    processed_rows: 5,
                    ..JobProgress::default()
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_propagated() {
        let mut events = MockImportEventPublisher::new();
        events
            .expect_publish()
            .returning(|_| Err(anyhow::anyhow!("channel closed")));
        let metrics = Arc::new(ImportMetrics::new("test"));
        let notifier = JobNotifier::new(Arc::new(events), metrics.clone());
        let mut job = ImportJob::new(Uuid::new_v4(), "f".to_string(), "a.csv".to_string());
        job.status = ImportJobStatus::Failed;
        notifier.status_changed(&job).await;
        assert!(metrics.gather_metrics().contains("status=\"FAILED\""));
    }
}
