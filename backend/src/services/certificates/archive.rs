//! Turning a stored batch into a ZIP download, and bucket cleanup.
//!
//! Archiving consumes the batch: once the archive is built every object of
//! the batch is deleted. A second download of the same batch is a NotFound.

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use common::requests::CleanupResponse;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::services::templates::TEMPLATE_OBJECT_PREFIX;
use crate::state::AppState;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct BatchArchive {
    pub batch_id: String,
    pub file_count: usize,
    pub bytes: Vec<u8>,
}

fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// `name.pdf`, `name_2.pdf`, `name_3.pdf` ...
fn unique_entry_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn build_zip(files: Vec<(String, Vec<u8>)>) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut taken = HashSet::new();
    for (key, bytes) in files {
        writer.start_file(unique_entry_name(base_name(&key), &mut taken), options)?;
        writer.write_all(&bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Archives every object under `{batch_id}/` and deletes them.
async fn archive_and_delete(state: &AppState, batch_id: &str) -> AppResult<BatchArchive> {
    let reserved = TEMPLATE_OBJECT_PREFIX.trim_end_matches('/');
    if batch_id.is_empty() || batch_id.contains('/') || batch_id == reserved {
        return Err(AppError::Validation(format!("Invalid batch id '{batch_id}'")));
    }
    let keys = state.objects.list_by_prefix(&format!("{batch_id}/")).await?;

    let mut files = Vec::with_capacity(keys.len());
    for key in &keys {
        match state.objects.get(key).await? {
            Some(bytes) => files.push((key.clone(), bytes)),
            None => log::warn!("{} disappeared before it could be archived", key),
        }
    }
    if files.is_empty() {
        return Err(AppError::NotFound(format!("No certificates found for batch {batch_id}")));
    }

    let file_count = files.len();
    let bytes = tokio::task::spawn_blocking(move || build_zip(files))
        .await
        .map_err(StorageError::from)?
        .map_err(|e| StorageError::Io(e.into()))?;

    match state.objects.delete_many(&keys).await {
        Ok(deleted) => log::info!("Batch {}: archived {} files, deleted {}", batch_id, file_count, deleted),
        Err(e) => log::error!("Batch {}: archived but objects not deleted: {}", batch_id, e),
    }

    Ok(BatchArchive {
        batch_id: batch_id.to_string(),
        file_count,
        bytes,
    })
}

/// Archives the batch named by the current-batch pointer and clears it.
pub async fn archive_current_batch(state: &AppState) -> AppResult<BatchArchive> {
    let batch_id = state
        .pointer
        .get()
        .await?
        .ok_or_else(|| AppError::NotFound("No certificates generated in current session".to_string()))?;
    let archive = archive_and_delete(state, &batch_id).await?;
    if let Err(e) = state.pointer.clear().await {
        log::error!("Batch {}: pointer not cleared: {}", batch_id, e);
    }
    Ok(archive)
}

/// Archives an explicitly named batch. The pointer is cleared only when it
/// still names this batch.
pub async fn archive_batch(state: &AppState, batch_id: &str) -> AppResult<BatchArchive> {
    let archive = archive_and_delete(state, batch_id).await?;
    match state.pointer.get().await {
        Ok(Some(current)) if current == batch_id => {
            if let Err(e) = state.pointer.clear().await {
                log::error!("Batch {}: pointer not cleared: {}", batch_id, e);
            }
        }
        Ok(_) => {}
        Err(e) => log::error!("Batch {}: pointer not readable: {}", batch_id, e),
    }
    Ok(archive)
}

/// Deletes every object in the bucket, orphaned batches included. The
/// pointer is left alone.
pub async fn cleanup(state: &AppState) -> AppResult<usize> {
    let keys = state.objects.list_by_prefix("").await?;
    let deleted = state.objects.delete_many(&keys).await?;
    log::info!("Cleanup removed {} objects", deleted);
    Ok(deleted)
}

fn zip_response(archive: BatchArchive) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format!(
                "certificates_{}.zip",
                archive.batch_id
            ))],
        })
        .body(archive.bytes)
}

pub(crate) async fn download(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    Ok(zip_response(archive_current_batch(&state).await?))
}

pub(crate) async fn download_batch(state: web::Data<AppState>, batch_id: web::Path<String>) -> AppResult<HttpResponse> {
    Ok(zip_response(archive_batch(&state, &batch_id).await?))
}

pub(crate) async fn process_cleanup(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let deleted_count = cleanup(&state).await?;
    Ok(HttpResponse::Ok().json(CleanupResponse {
        success: true,
        deleted_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_numbered() {
        let mut taken = HashSet::new();
        assert_eq!(unique_entry_name("a.pdf", &mut taken), "a.pdf");
        assert_eq!(unique_entry_name("a.pdf", &mut taken), "a_2.pdf");
        assert_eq!(unique_entry_name("a.pdf", &mut taken), "a_3.pdf");
        assert_eq!(unique_entry_name("README", &mut taken), "README");
        assert_eq!(unique_entry_name("README", &mut taken), "README_2");
    }

    #[test]
    fn zip_entries_use_base_names() {
        let bytes = build_zip(vec![
            ("b1/Anna_1.pdf".into(), b"one".to_vec()),
            ("b1/nested/Anna_1.pdf".into(), b"two".to_vec()),
        ])
        .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Anna_1.pdf".to_string()));
        assert!(names.contains(&"Anna_1_2.pdf".to_string()));
        assert_eq!(archive.by_name("Anna_1_2.pdf").unwrap().size(), 3);
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;
    use crate::services::certificates::generate::{generate, EventMetadata, GenerationOutcome};
    use crate::test_support::TestEnv;

    async fn issued_batch(env: &TestEnv, names: &[&str]) -> String {
        env.seed_participants(names).await;
        let template = env.seed_template("<p>{{participant_name}}</p>").await;
        match generate(&env.state, &template.id, &EventMetadata::default()).await.unwrap() {
            GenerationOutcome::Issued { batch_id, .. } => batch_id,
            GenerationOutcome::NoParticipants => panic!("roster was seeded"),
        }
    }

    #[tokio::test]
    async fn archiving_twice_is_not_found() {
        let env = TestEnv::new(&[]);
        let batch_id = issued_batch(&env, &["Anna", "Boris"]).await;

        let archive = archive_current_batch(&env.state).await.unwrap();
        assert_eq!(archive.batch_id, batch_id);
        assert_eq!(archive.file_count, 2);
        assert!(!archive.bytes.is_empty());
        assert!(env.state.objects.list_by_prefix(&format!("{batch_id}/")).await.unwrap().is_empty());
        assert_eq!(env.state.pointer.get().await.unwrap(), None);

        let err = archive_current_batch(&env.state).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn explicit_batch_leaves_foreign_pointer() {
        let env = TestEnv::new(&[]);
        let batch_id = issued_batch(&env, &["Anna"]).await;
        env.state.pointer.set("otherbat", std::time::Duration::from_secs(60)).await.unwrap();

        let archive = archive_batch(&env.state, &batch_id).await.unwrap();
        assert_eq!(archive.file_count, 1);
        assert_eq!(env.state.pointer.get().await.unwrap().as_deref(), Some("otherbat"));

        assert!(matches!(
            archive_batch(&env.state, &batch_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(archive_batch(&env.state, "").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn template_prefix_is_not_a_batch() {
        let env = TestEnv::new(&[]);
        env.state
            .objects
            .put("templates/t1/template.html", b"<p>{{participant_name}}</p>".to_vec())
            .await
            .unwrap();

        assert!(matches!(
            archive_batch(&env.state, "templates").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(env.state.objects.list_by_prefix("templates/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn explicit_batch_clears_matching_pointer() {
        let env = TestEnv::new(&[]);
        let batch_id = issued_batch(&env, &["Anna"]).await;
        archive_batch(&env.state, &batch_id).await.unwrap();
        assert_eq!(env.state.pointer.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn cleanup_counts_and_keeps_pointer() {
        let env = TestEnv::new(&[]);
        assert_eq!(cleanup(&env.state).await.unwrap(), 0);

        let batch_id = issued_batch(&env, &["Anna", "Boris"]).await;
        assert_eq!(cleanup(&env.state).await.unwrap(), 2);
        assert_eq!(env.state.pointer.get().await.unwrap(), Some(batch_id));
        // The pointer now names an empty batch.
        assert!(matches!(
            archive_current_batch(&env.state).await,
            Err(AppError::NotFound(_))
        ));
    }
}
