mod config;
mod error;
mod job_controller;
mod services;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use crate::config::Settings;
use crate::job_controller::state::JobsState;
use crate::services::email::LogMailer;
use crate::services::render::pdf::GenpdfRenderer;
use crate::state::AppState;
use crate::storage::fs_objects::FsObjectStore;
use crate::storage::sqlite_kv::SqliteMetadataStore;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::io;
use std::sync::Arc;

/// Registers `/health` and every `/api/v1` scope.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(services::health::process)).service(
        web::scope("/api/v1")
            .service(services::certificates::configure_routes())
            .service(services::templates::configure_routes())
            .service(services::participants::configure_routes())
            .service(job_controller::configure_routes()),
    );
}

fn startup_error(what: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{what}: {e}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = Settings::load().map_err(|e| startup_error("invalid configuration", e))?;
    env_logger::init_from_env(Env::default().default_filter_or(settings.log_level.as_str()));

    let kv = SqliteMetadataStore::open(&settings.database_path)
        .map_err(|e| startup_error("cannot open metadata store", e))?;
    let objects = FsObjectStore::open(settings.bucket_dir.clone())
        .map_err(|e| startup_error("cannot open object store", e))?;
    tokio::fs::create_dir_all(&settings.templates_dir).await?;
    let renderer = GenpdfRenderer::new(settings.fonts_dir.clone(), settings.font_family.clone());

    let host = settings.host.clone();
    let port = settings.port;
    let json_limit = settings.max_upload_bytes;
    info!(
        "{} starting at http://{}:{} (metadata {}, bucket {})",
        settings.service_name,
        host,
        port,
        settings.database_path,
        settings.bucket_dir.display()
    );

    let state = web::Data::new(AppState::new(
        settings,
        Arc::new(kv),
        Arc::new(objects),
        Arc::new(renderer),
        Arc::new(LogMailer),
    ));

    // Background job state and its single updater task.
    let (jobs_state, rx) = JobsState::new();
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });
    let jobs = web::Data::new(jobs_state);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(state.clone())
            .app_data(jobs.clone())
            .configure(configure_app)
    })
    .bind((host, port))?
    .run()
    .await
}
