use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::model::participant::{Participant, UploadResponse};
use md5::Context;
use uuid::Uuid;

use super::roster;
use crate::error::AppResult;
use crate::services::multipart::read_form;
use crate::state::AppState;

pub(crate) async fn process(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let form = read_form(payload, state.settings.max_upload_bytes).await?;
    let (filename, bytes) = form.file()?;
    let response = replace_roster(&state, filename, bytes).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Parses an uploaded roster and replaces every stored participant with it.
///
/// The old roster is deleted before the new one is written. A storage failure
/// in between leaves a partial roster behind.
pub async fn replace_roster(state: &AppState, filename: &str, bytes: &[u8]) -> AppResult<UploadResponse> {
    let (rows, errors) = roster::parse(bytes, filename)?;

    let mut md5_hasher = Context::new();
    md5_hasher.consume(bytes);
    let checksum = format!("{:x}", md5_hasher.finalize());

    let removed = state.participants.delete_all().await?;
    let ttl = state.settings.participant_ttl();
    let uploaded_at = Utc::now();

    let mut participants = Vec::with_capacity(rows.len());
    for row in rows {
        let participant = Participant {
            id: Uuid::new_v4().to_string(),
            full_name: row.full_name,
            email: row.email,
            role: row.role,
            place: row.place,
            uploaded_at: Some(uploaded_at),
        };
        state.participants.save(&participant, ttl).await?;
        participants.push(participant);
    }
    state.participants.set_checksum(&checksum, ttl).await?;

    log::info!(
        "Roster {} uploaded: {} participants stored, {} replaced, {} row messages",
        filename,
        participants.len(),
        removed,
        errors.len()
    );
    for message in &errors {
        log::warn!("{}: {}", filename, message);
    }

    Ok(UploadResponse {
        success: true,
        count: participants.len(),
        participants,
        errors,
        checksum,
    })
}
