//! Shared state of background jobs.
//!
//! - `JobsState`: clonable handle holding the status map and the sender used
//!   by workers. It is registered as `web::Data` in `main.rs`.
//! - `JobUpdate`: a status change sent by a worker.
//! - `start_job_updater`: the task that applies updates to the map.

use common::jobs::JobStatus;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 100;
/// Finished jobs kept for status queries; older ones are evicted first.
const MAX_FINISHED_JOBS: usize = 1000;

#[derive(Clone)]
pub struct JobsState {
    /// Job id to its latest status. Readers are the status endpoint, the
    /// only writer is `start_job_updater` (plus the initial `Pending`).
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
    pub tx: mpsc::Sender<JobUpdate>,
}

#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobsState {
    /// Creates the state and the receiving end for `start_job_updater`.
    pub fn new() -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let state = JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    /// Registers a new job as `Pending` and returns its id.
    pub async fn register(&self) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.write().await.insert(job_id.clone(), JobStatus::Pending);
        job_id
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Queues a status change. A closed channel only means the server is
    /// shutting down, so the update is dropped.
    pub async fn report(&self, job_id: &str, status: JobStatus) {
        let update = JobUpdate {
            job_id: job_id.to_string(),
            status,
        };
        if self.tx.send(update).await.is_err() {
            log::debug!("job updater gone, dropping update for {}", job_id);
        }
    }
}

/// Applies every received `JobUpdate` to the shared map until all senders
/// are dropped.
pub async fn start_job_updater(state: JobsState, rx: mpsc::Receiver<JobUpdate>) {
    run_updater(state, rx, MAX_FINISHED_JOBS).await;
}

async fn run_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>, max_finished: usize) {
    let mut finished: VecDeque<String> = VecDeque::new();
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        if update.status.is_finished() && !finished.contains(&update.job_id) {
            finished.push_back(update.job_id.clone());
        }
        jobs.insert(update.job_id, update.status);
        while finished.len() > max_finished {
            if let Some(old) = finished.pop_front() {
                log::debug!("evicting finished job {}", old);
                jobs.remove(&old);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_flow_through_the_updater() {
        let (state, rx) = JobsState::new();
        let updater = tokio::spawn(start_job_updater(state.clone(), rx));

        let id = state.register().await;
        assert_eq!(state.status(&id).await, Some(JobStatus::Pending));

        state.report(&id, JobStatus::InProgress(50)).await;
        state.report(&id, JobStatus::Completed("sent 1 of 2".into())).await;

        for _ in 0..50 {
            if state.status(&id).await.is_some_and(|s| s.is_finished()) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(
            state.status(&id).await,
            Some(JobStatus::Completed("sent 1 of 2".into()))
        );
        updater.abort();
    }

    #[tokio::test]
    async fn oldest_finished_jobs_are_evicted() {
        let (state, rx) = JobsState::new();
        let updater = tokio::spawn(run_updater(state.clone(), rx, 2));

        let running = state.register().await;
        let mut done = Vec::new();
        for _ in 0..3 {
            let id = state.register().await;
            state.report(&id, JobStatus::Completed("ok".into())).await;
            done.push(id);
        }
        state.report(&running, JobStatus::InProgress(10)).await;

        for _ in 0..50 {
            if state.status(&running).await == Some(JobStatus::InProgress(10)) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.status(&done[0]).await, None);
        assert!(state.status(&done[1]).await.is_some());
        assert!(state.status(&done[2]).await.is_some());
        assert_eq!(state.status(&running).await, Some(JobStatus::InProgress(10)));
        updater.abort();
    }
}
