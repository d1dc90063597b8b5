//! Background job tracking.
//!
//! Jobs run outside the request cycle (e-mail delivery after a generation)
//! and report their [`JobStatus`](common::jobs::JobStatus) through a channel
//! consumed by a single updater task. Clients poll
//! `GET /api/v1/jobs/{job_id}`.

pub mod state;
pub mod status;

use actix_web::web::{get, scope};
use actix_web::Scope;

pub fn configure_routes() -> Scope {
    scope("/jobs").route("/{job_id}", get().to(status::process))
}
