//! Participant roster management.
//!
//! Routes, all under `/api/v1/participants`:
//! - `POST /upload`: multipart `file` (CSV or XLSX). Replaces the whole roster.
//! - `GET /` and `DELETE /`: list or remove every participant.
//! - `GET /{id}` and `DELETE /{id}`: one participant.

mod manage;
pub mod roster;
pub mod upload;

use actix_web::web::{delete, get, post, scope};
use actix_web::Scope;

pub fn configure_routes() -> Scope {
    scope("/participants")
        .route("/upload", post().to(upload::process))
        .route("", get().to(manage::list))
        .route("", delete().to(manage::delete_all))
        .route("/{participant_id}", get().to(manage::get_one))
        .route("/{participant_id}", delete().to(manage::delete_one))
}
