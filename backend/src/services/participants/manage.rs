use actix_web::{web, HttpResponse};
use common::model::participant::ParticipantList;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub(crate) async fn list(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let participants = state.participants.all().await?;
    Ok(HttpResponse::Ok().json(ParticipantList {
        total: participants.len(),
        participants,
    }))
}

pub(crate) async fn get_one(state: web::Data<AppState>, id: web::Path<String>) -> AppResult<HttpResponse> {
    match state.participants.get(&id).await? {
        Some(participant) => Ok(HttpResponse::Ok().json(participant)),
        None => Err(AppError::NotFound(format!("Participant {id} not found"))),
    }
}

pub(crate) async fn delete_one(state: web::Data<AppState>, id: web::Path<String>) -> AppResult<HttpResponse> {
    if !state.participants.delete(&id).await? {
        return Err(AppError::NotFound(format!("Participant {id} not found")));
    }
    log::info!("Participant {} deleted", id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

pub(crate) async fn delete_all(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let deleted = state.participants.delete_all().await?;
    log::info!("All participants deleted ({})", deleted);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "deleted_count": deleted })))
}
