use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// LeaseError はリース取得の失敗。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseError {
    #[error("job {0} already has an active worker")]
    AlreadyHeld(Uuid),
}

struct LeaseEntry {
    lease_id: Uuid,
    token: CancellationToken,
}

/// JobLeaseRegistry はジョブごとに高々1つのワーカーだけが動作することを保証する。
///
/// 各リースは CancellationToken を持ち、キャンセル要求やウォッチドッグから発火される。
#[derive(Default)]
pub struct JobLeaseRegistry {
    leases: Mutex<HashMap<Uuid, LeaseEntry>>,
}

impl JobLeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, LeaseEntry>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// リースを取得する。既に保持されていれば AlreadyHeld。
    pub fn acquire(self: &Arc<Self>, job_id: Uuid) -> Result<JobLease, LeaseError> {
        let mut leases = self.lock();
        if leases.contains_key(&job_id) {
            return Err(LeaseError::AlreadyHeld(job_id));
        }
        let lease_id = Uuid::new_v4();
        let token = CancellationToken::new();
        leases.insert(
            job_id,
            LeaseEntry {
                lease_id,
                token: token.clone(),
            },
        );
        Ok(JobLease {
            registry: Arc::clone(self),
            job_id,
            lease_id,
            token,
        })
    }

    /// 保持中のリースのトークンを発火する。リースが存在した場合は true。
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.lock().get(&job_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_held(&self, job_id: Uuid) -> bool {
        self.lock().contains_key(&job_id)
    }

    fn release(&self, job_id: Uuid, lease_id: Uuid) {
        let mut leases = self.lock();
        if leases.get(&job_id).is_some_and(|e| e.lease_id == lease_id) {
            leases.remove(&job_id);
        }
    }
}

/// JobLease はワーカーが保持するリース。Drop 時に解放される。
pub struct JobLease {
    registry: Arc<JobLeaseRegistry>,
    job_id: Uuid,
    lease_id: Uuid,
    token: CancellationToken,
}

impl JobLease {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.registry.release(self.job_id, self.lease_id);
    }
}

impl std::fmt::Debug for JobLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLease")
            .field("job_id", &self.job_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
