use serde::{Deserialize, Serialize};

/// Status of a background job, as reported by `GET /api/v1/jobs/{job_id}`.
///
/// `InProgress` carries a completion percentage; `Completed` and `Failed`
/// carry a human readable summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress(u32),
    Completed(String),
    Failed(String),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed(_))
    }
}
