//! Certificate template management.
//!
//! Routes, all under `/api/v1/templates`:
//! - `POST /` with a JSON body, `POST /upload` with a markup file and
//!   `POST /upload_zip` with an HTML file plus its images.
//! - `GET /` lists, `GET|PUT|DELETE /{id}` work on one template by exact id.
//!
//! Lookups used by certificate generation go through [`resolver`] instead,
//! which also accepts prefixes, timestamps and names.

mod content;
mod create;
mod manage;
pub mod resolver;
mod zip_bundle;

pub use content::{load_content, OBJECT_PREFIX as TEMPLATE_OBJECT_PREFIX};

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

pub fn configure_routes() -> Scope {
    scope("/templates")
        .route("", post().to(create::from_json))
        .route("", get().to(manage::list))
        .route("/upload", post().to(create::from_file))
        .route("/upload_zip", post().to(create::from_zip))
        .route("/{template_id}", get().to(manage::get_one))
        .route("/{template_id}", put().to(manage::update))
        .route("/{template_id}", delete().to(manage::delete_one))
}
