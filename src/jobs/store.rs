//! Bounded, time-expiring store for translation jobs.
//!
//! Shared between the orchestrator (writer on create), the webhook receiver
//! (writer on resolve), and the polling path (reader + deleter on
//! consumption). Capacity and TTL bound memory: the oldest entry is evicted
//! on overflow and expired entries are purged lazily on every access, so a
//! vanished id is indistinguishable from one that never existed.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::record::{JobRecord, JobState, Outcome};

/// Completion notifications that can outrun the orchestrator's own insert are
/// held here until the record appears. Small: only races land in it.
const EARLY_BUFFER_CAPACITY: usize = 64;

/// What happened to a resolve attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveStatus {
    /// The pending record transitioned to its terminal state.
    Applied,
    /// The job already reached a terminal state; the notification was a no-op.
    AlreadyResolved,
    /// No record exists yet; the outcome was buffered for a late insert.
    Buffered,
}

struct EarlyNotification {
    job_id: String,
    outcome: Outcome,
    webhook_id: Option<String>,
    received_at: Instant,
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<String, JobRecord>,
    /// Insertion order, oldest first. May hold stale keys for jobs that were
    /// consumed early; eviction skips those.
    order: VecDeque<String>,
    early: VecDeque<EarlyNotification>,
}

/// Bounded key-value table of translation jobs.
pub struct JobStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
    ttl: Duration,
}

impl JobStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity,
            ttl,
        }
    }

    /// Create a `Pending` record for a freshly accepted translation.
    ///
    /// If a completion notification for this id already arrived (webhooks can
    /// race ahead of our bookkeeping), it is applied immediately and the
    /// record lands directly in its terminal state.
    pub async fn insert_pending(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        self.prune(&mut inner, now);

        while inner.jobs.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    if inner.jobs.remove(&oldest).is_some() {
                        warn!(job_id = %oldest, "Job store at capacity, evicting oldest entry");
                    }
                }
                None => break,
            }
        }

        let mut record = JobRecord::pending(job_id);
        if let Some(pos) = inner.early.iter().position(|n| n.job_id == job_id) {
            if let Some(early) = inner.early.remove(pos) {
                debug!(%job_id, "Applying buffered notification to new job record");
                record.state = early.outcome.into();
                record.webhook_id = early.webhook_id;
            }
        }
        inner.order.push_back(job_id.to_string());
        inner.jobs.insert(job_id.to_string(), record);
    }

    /// Apply a terminal outcome to a job.
    ///
    /// Exactly one terminal transition is allowed per job; anything after
    /// that is acknowledged as a duplicate. An outcome for an id with no
    /// record is buffered rather than dropped.
    pub async fn resolve(
        &self,
        job_id: &str,
        outcome: Outcome,
        webhook_id: Option<String>,
    ) -> ResolveStatus {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        self.prune(&mut inner, now);

        match inner.jobs.get_mut(job_id) {
            Some(record) if record.state == JobState::Pending => {
                record.state = outcome.into();
                if webhook_id.is_some() {
                    record.webhook_id = webhook_id;
                }
                ResolveStatus::Applied
            }
            Some(_) => ResolveStatus::AlreadyResolved,
            None => {
                // Keep the first buffered outcome for an id; duplicates of a
                // buffered notification are no-ops too.
                if !inner.early.iter().any(|n| n.job_id == job_id) {
                    if inner.early.len() >= EARLY_BUFFER_CAPACITY {
                        inner.early.pop_front();
                    }
                    inner.early.push_back(EarlyNotification {
                        job_id: job_id.to_string(),
                        outcome,
                        webhook_id,
                        received_at: now,
                    });
                }
                ResolveStatus::Buffered
            }
        }
    }

    /// Look up a job, if it still exists.
    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        let mut inner = self.inner.write().await;
        self.prune(&mut inner, Instant::now());
        inner.jobs.get(job_id).cloned()
    }

    /// Remove a job. Subsequent lookups for the id return `None`.
    pub async fn remove(&self, job_id: &str) -> Option<JobRecord> {
        let mut inner = self.inner.write().await;
        inner.jobs.remove(job_id)
    }

    pub async fn len(&self) -> usize {
        let mut inner = self.inner.write().await;
        self.prune(&mut inner, Instant::now());
        inner.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired records and stale early notifications. `order` is oldest
    /// first, so expiry scanning stops at the first live entry.
    fn prune(&self, inner: &mut StoreInner, now: Instant) {
        loop {
            let Some(front) = inner.order.front().cloned() else {
                break;
            };
            match inner.jobs.get(&front) {
                Some(record) if now.duration_since(record.created_at) > self.ttl => {
                    inner.order.pop_front();
                    inner.jobs.remove(&front);
                    debug!(job_id = %front, "Job record expired");
                }
                Some(_) => break,
                // Stale key left behind by an explicit remove.
                None => {
                    inner.order.pop_front();
                }
            }
        }
        let ttl = self.ttl;
        inner
            .early
            .retain(|n| now.duration_since(n.received_at) <= ttl);
    }
}
