use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::model::template::{TemplateList, TemplateWithContent, UpdateTemplate};

use super::content;
use crate::error::{AppError, AppResult};
use crate::services::render::extract_variables;
use crate::state::AppState;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Template {id} not found"))
}

pub(crate) async fn list(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let mut templates = state.templates.all().await?;
    templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(TemplateList {
        total: templates.len(),
        templates,
    }))
}

pub(crate) async fn get_one(state: web::Data<AppState>, id: web::Path<String>) -> AppResult<HttpResponse> {
    let record = state.templates.get(&id).await?.ok_or_else(|| not_found(&id))?;
    let content = content::load_content(state.objects.as_ref(), &record.content_ref).await?;
    Ok(HttpResponse::Ok().json(TemplateWithContent { record, content }))
}

pub(crate) async fn update(
    state: web::Data<AppState>,
    id: web::Path<String>,
    payload: web::Json<UpdateTemplate>,
) -> AppResult<HttpResponse> {
    let mut record = state.templates.get(&id).await?.ok_or_else(|| not_found(&id))?;
    let changes = payload.into_inner();

    if let Some(name) = changes.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Template name is required".to_string()));
        }
        record.name = name.trim().to_string();
    }
    if let Some(markup) = &changes.content {
        content::overwrite(state.objects.as_ref(), &record.content_ref, markup).await?;
    }
    match (changes.variables, &changes.content) {
        (Some(variables), _) => record.variables = variables,
        (None, Some(markup)) => record.variables = extract_variables(markup),
        (None, None) => {}
    }
    record.updated_at = Some(Utc::now());

    state.templates.save(&record).await?;
    log::info!("Template {} updated", record.id);
    Ok(HttpResponse::Ok().json(record))
}

pub(crate) async fn delete_one(state: web::Data<AppState>, id: web::Path<String>) -> AppResult<HttpResponse> {
    let record = state.templates.get(&id).await?.ok_or_else(|| not_found(&id))?;
    content::remove(state.objects.as_ref(), &state.settings.templates_dir, &record).await?;
    state.templates.delete(&record.id).await?;
    log::info!("Template {} deleted", record.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
