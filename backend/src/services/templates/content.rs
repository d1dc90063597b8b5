//! Where template markup lives.
//!
//! New templates are written to `{templates_dir}/{id}/template.{ext}` and the
//! record's `content_ref` holds that path. Records whose `content_ref` starts
//! with `templates/` point into the object store instead.

use common::model::template::{TemplateRecord, TemplateType};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::storage::{ObjectStore, StorageError, StorageResult};

/// Object-store keys under this prefix hold template markup, not certificates.
pub const OBJECT_PREFIX: &str = "templates/";

fn is_object_key(content_ref: &str) -> bool {
    content_ref.starts_with(OBJECT_PREFIX)
}

pub fn content_path(templates_dir: &Path, id: &str, kind: TemplateType) -> PathBuf {
    templates_dir.join(id).join(format!("template.{}", kind.extension()))
}

pub async fn load_content(objects: &dyn ObjectStore, content_ref: &str) -> AppResult<String> {
    let bytes = if is_object_key(content_ref) {
        objects
            .get(content_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template content not found: {content_ref}")))?
    } else {
        match tokio::fs::read(content_ref).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Template content not found: {content_ref}")))
            }
            Err(e) => return Err(StorageError::Io(e).into()),
        }
    };
    String::from_utf8(bytes)
        .map_err(|_| AppError::Validation(format!("Template content is not UTF-8: {content_ref}")))
}

/// Writes markup for a new template and returns its `content_ref`.
pub async fn write_new(templates_dir: &Path, id: &str, kind: TemplateType, markup: &str) -> StorageResult<String> {
    let path = content_path(templates_dir, id, kind);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, markup).await?;
    Ok(path.to_string_lossy().into_owned())
}

/// Overwrites the markup behind an existing record.
pub async fn overwrite(objects: &dyn ObjectStore, content_ref: &str, markup: &str) -> StorageResult<()> {
    if is_object_key(content_ref) {
        return objects.put(content_ref, markup.as_bytes().to_vec()).await;
    }
    if let Some(parent) = Path::new(content_ref).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(content_ref, markup).await?;
    Ok(())
}

/// Removes the markup of a deleted template. Missing content is not an error.
pub async fn remove(objects: &dyn ObjectStore, templates_dir: &Path, record: &TemplateRecord) -> StorageResult<()> {
    if is_object_key(&record.content_ref) {
        objects.delete_many(&[record.content_ref.clone()]).await?;
        return Ok(());
    }
    let own_dir = templates_dir.join(&record.id);
    let result = if Path::new(&record.content_ref).starts_with(&own_dir) {
        tokio::fs::remove_dir_all(&own_dir).await
    } else {
        tokio::fs::remove_file(&record.content_ref).await
    };
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs_objects::FsObjectStore;

    #[tokio::test]
    async fn filesystem_and_object_references() {
        let dir = tempfile::tempdir().unwrap();
        let objects = FsObjectStore::open(dir.path().join("bucket")).unwrap();
        let templates_dir = dir.path().join("templates");

        let path = write_new(&templates_dir, "t1", TemplateType::Svg, "<svg/>").await.unwrap();
        assert!(path.ends_with("template.svg"));
        assert_eq!(load_content(&objects, &path).await.unwrap(), "<svg/>");

        objects.put("templates/t2/template.html", b"<p>x</p>".to_vec()).await.unwrap();
        assert_eq!(
            load_content(&objects, "templates/t2/template.html").await.unwrap(),
            "<p>x</p>"
        );
        overwrite(&objects, "templates/t2/template.html", "<p>y</p>").await.unwrap();
        assert_eq!(
            load_content(&objects, "templates/t2/template.html").await.unwrap(),
            "<p>y</p>"
        );

        assert!(matches!(
            load_content(&objects, "templates/missing.html").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            load_content(&objects, dir.path().join("nope.html").to_str().unwrap()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
