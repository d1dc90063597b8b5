use actix_web::{web, HttpResponse};
use common::model::template::TemplateType;
use common::requests::PreviewQuery;

use super::generate::{participant_variables, resolve_template, EventMetadata};
use crate::error::{AppError, AppResult};
use crate::services::render::substitute;
use crate::state::AppState;

/// Markup of one participant's certificate with every placeholder filled in.
pub async fn preview(
    state: &AppState,
    participant_id: &str,
    query: PreviewQuery,
) -> AppResult<(TemplateType, String)> {
    let participant = state
        .participants
        .get(participant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Participant {participant_id} not found")))?;
    let (record, markup) = resolve_template(state, &query.template_id).await?;
    let event = EventMetadata {
        event_name: query.event_name.unwrap_or_default(),
        event_location: query.event_location.unwrap_or_default(),
        issue_date: query.issue_date.unwrap_or_default(),
    };
    let filled = substitute(&markup, &participant_variables(&participant, &event));
    Ok((record.template_type, filled))
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    participant_id: web::Path<String>,
    query: web::Query<PreviewQuery>,
) -> AppResult<HttpResponse> {
    let (kind, markup) = preview(&state, &participant_id, query.into_inner()).await?;
    let content_type = match kind {
        TemplateType::Html => "text/html; charset=utf-8",
        TemplateType::Svg => "image/svg+xml",
    };
    Ok(HttpResponse::Ok().content_type(content_type).body(markup))
}
