//! Certificate batches.
//!
//! Routes, all under `/api/v1/certificates`:
//! - `POST /generate`: render a batch for the current roster.
//! - `GET /download`: ZIP of the current batch, which is then deleted.
//! - `GET /download/{batch_id}`: same for an explicit batch.
//! - `POST /cleanup`: empty the whole bucket.
//! - `GET /{participant_id}/preview`: filled-in markup for one participant.

pub mod archive;
pub mod generate;
pub mod preview;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

pub fn configure_routes() -> Scope {
    scope("/certificates")
        .route("/generate", post().to(generate::process))
        .route("/download", get().to(archive::download))
        .route("/download/{batch_id}", get().to(archive::download_batch))
        .route("/cleanup", post().to(archive::process_cleanup))
        .route("/{participant_id}/preview", get().to(preview::process))
}
