use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::model::template::{CreateTemplate, TemplateRecord, TemplateType};
use uuid::Uuid;

use super::{content, zip_bundle};
use crate::error::{AppError, AppResult};
use crate::services::multipart::read_form;
use crate::services::render::extract_variables;
use crate::state::AppState;

/// Fields of a template that is about to be stored.
pub(crate) struct NewTemplate {
    pub name: String,
    pub kind: TemplateType,
    pub markup: String,
    pub variables: Vec<String>,
    pub image_count: u32,
}

/// Writes the markup, then the record. Variables default to the placeholders
/// found in the markup.
pub(crate) async fn store(state: &AppState, new: NewTemplate) -> AppResult<TemplateRecord> {
    if new.name.trim().is_empty() {
        return Err(AppError::Validation("Template name is required".to_string()));
    }
    if new.markup.trim().is_empty() {
        return Err(AppError::Validation("Template content is empty".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let content_ref = content::write_new(&state.settings.templates_dir, &id, new.kind, &new.markup).await?;
    let variables = if new.variables.is_empty() {
        extract_variables(&new.markup)
    } else {
        new.variables
    };

    let record = TemplateRecord {
        id,
        name: new.name.trim().to_string(),
        template_type: new.kind,
        content_ref,
        variables,
        has_images: new.image_count > 0,
        image_count: new.image_count,
        created_at: Utc::now(),
        updated_at: None,
    };
    state.templates.save(&record).await?;
    log::info!(
        "Template {} ({}) stored with variables {:?}",
        record.id,
        record.name,
        record.variables
    );
    Ok(record)
}

pub(crate) async fn from_json(
    state: web::Data<AppState>,
    payload: web::Json<CreateTemplate>,
) -> AppResult<HttpResponse> {
    let req = payload.into_inner();
    let record = store(
        &state,
        NewTemplate {
            name: req.name,
            kind: req.template_type,
            markup: req.content,
            variables: req.variables,
            image_count: 0,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

fn stem(filename: &str) -> &str {
    filename.rsplit_once('.').map_or(filename, |(stem, _)| stem)
}

pub(crate) async fn from_file(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let form = read_form(payload, state.settings.max_upload_bytes).await?;
    let (filename, bytes) = form.file()?;
    let kind = TemplateType::from_filename(filename)
        .ok_or_else(|| AppError::Validation("Template must be an .html or .svg file".to_string()))?;
    let markup = String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::Validation("Template file is not UTF-8".to_string()))?;
    let name = form.text("name").unwrap_or_else(|| stem(filename).to_string());

    let record = store(
        &state,
        NewTemplate {
            name,
            kind,
            markup,
            variables: Vec::new(),
            image_count: 0,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

pub(crate) async fn from_zip(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let form = read_form(payload, state.settings.max_upload_bytes).await?;
    let (filename, bytes) = form.file()?;
    if !filename.to_lowercase().ends_with(".zip") {
        return Err(AppError::Validation("Template bundle must be a .zip file".to_string()));
    }
    let name = form.text("name").unwrap_or_else(|| stem(filename).to_string());
    let bundle = zip_bundle::unpack(bytes, state.settings.max_upload_bytes)?;

    let record = store(
        &state,
        NewTemplate {
            name,
            kind: TemplateType::Html,
            markup: bundle.html,
            variables: Vec::new(),
            image_count: bundle.image_count,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}
