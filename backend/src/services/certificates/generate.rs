//! Batch generation: one PDF per participant, stored under a fresh batch id.
//!
//! 1. Resolve the template identifier and load its markup.
//! 2. Enumerate participants. An empty roster is a warning, not an error.
//! 3. Render every participant on a blocking thread with rayon. A failure
//!    or panic for one participant is recorded and the batch continues.
//! 4. Upload each PDF as `{batch_id}/{name}_{id8}.pdf`, then point the
//!    current-batch pointer at the new batch.

use actix_web::{web, HttpResponse};
use common::model::participant::Participant;
use common::model::template::{TemplateRecord, TemplateType};
use common::requests::{GenerateRequest, GenerateResponse, GenerateStatus};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::job_controller::state::JobsState;
use crate::services::email::{schedule_email_job, Delivery};
use crate::services::render::{RenderError, Renderer, Variables};
use crate::services::templates::{load_content, resolver};
use crate::state::AppState;

const BATCH_ID_LEN: usize = 8;

/// Event fields substituted into every certificate of a batch.
#[derive(Debug, Clone, Default)]
pub struct EventMetadata {
    pub event_name: String,
    pub event_location: String,
    pub issue_date: String,
}

#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub participant: Participant,
    pub object_key: String,
}

#[derive(Debug)]
pub enum GenerationOutcome {
    NoParticipants,
    Issued {
        batch_id: String,
        certificates: Vec<IssuedCertificate>,
        /// `"{full_name}: {error}"` for every participant that failed.
        errors: Vec<String>,
    },
}

impl GenerationOutcome {
    pub fn to_response(&self) -> GenerateResponse {
        match self {
            GenerationOutcome::NoParticipants => GenerateResponse {
                status: GenerateStatus::Warning,
                count: 0,
                batch_id: None,
                message: Some("No participants found".to_string()),
                errors: None,
                email_job_id: None,
            },
            GenerationOutcome::Issued {
                batch_id,
                certificates,
                errors,
            } => GenerateResponse {
                status: GenerateStatus::Success,
                count: certificates.len(),
                batch_id: Some(batch_id.clone()),
                message: Some(format!("Generated {} certificates", certificates.len())),
                errors: (!errors.is_empty()).then(|| errors.clone()),
                email_job_id: None,
            },
        }
    }
}

/// Body for a run that produced nothing. It keeps the `{status, message}`
/// shape of other errors.
fn failure_response(message: String) -> GenerateResponse {
    GenerateResponse {
        status: GenerateStatus::Error,
        count: 0,
        batch_id: None,
        message: Some(message),
        errors: None,
        email_job_id: None,
    }
}

/// Template variables for one participant.
pub fn participant_variables(participant: &Participant, event: &EventMetadata) -> Variables {
    let mut vars = Variables::new();
    vars.insert("participant_name".into(), participant.full_name.clone());
    vars.insert("full_name".into(), participant.full_name.clone());
    vars.insert("email".into(), participant.email.clone());
    vars.insert("role".into(), participant.role.clone());
    vars.insert(
        "place".into(),
        participant.place.map(|p| p.to_string()).unwrap_or_default(),
    );
    vars.insert("event_name".into(), event.event_name.clone());
    vars.insert("event_location".into(), event.event_location.clone());
    vars.insert("issue_date".into(), event.issue_date.clone());
    vars
}

/// File-name-safe form of a participant name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            '/' | '\\' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    if cleaned.is_empty() {
        "certificate".to_string()
    } else {
        cleaned
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Renders one participant. A panicking renderer becomes that participant's error.
fn render_one(
    renderer: &dyn Renderer,
    kind: TemplateType,
    markup: &str,
    variables: &Variables,
) -> Result<Vec<u8>, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(|| renderer.render(kind, markup, variables)))
        .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload.as_ref()))))
}

fn new_batch_id() -> String {
    Uuid::new_v4().simple().to_string()[..BATCH_ID_LEN].to_string()
}

pub(crate) async fn resolve_template(state: &AppState, identifier: &str) -> AppResult<(TemplateRecord, String)> {
    let (_, record) = resolver::resolve(&state.templates, identifier)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template '{identifier}' not found")))?;
    let markup = load_content(state.objects.as_ref(), &record.content_ref).await?;
    Ok((record, markup))
}

pub async fn generate(state: &AppState, identifier: &str, event: &EventMetadata) -> AppResult<GenerationOutcome> {
    log::info!("Starting certificate generation with template {}", identifier);
    let (record, markup) = resolve_template(state, identifier).await?;

    let participants = state.participants.all().await?;
    if participants.is_empty() {
        log::warn!("No participants found, nothing to generate");
        return Ok(GenerationOutcome::NoParticipants);
    }

    let batch_id = new_batch_id();
    log::info!(
        "Batch {}: rendering {} certificates from template {}",
        batch_id,
        participants.len(),
        record.id
    );

    let renderer = state.renderer.clone();
    let kind = record.template_type;
    let event = event.clone();
    let rendered: Vec<(Participant, Result<Vec<u8>, RenderError>)> = tokio::task::spawn_blocking(move || {
        participants
            .into_par_iter()
            .map(|p| {
                let result = render_one(renderer.as_ref(), kind, &markup, &participant_variables(&p, &event));
                (p, result)
            })
            .collect()
    })
    .await
    .map_err(|e| AppError::RenderFailure(format!("render task failed: {e}")))?;

    let mut certificates = Vec::new();
    let mut errors = Vec::new();
    for (participant, result) in rendered {
        match result {
            Ok(pdf) => {
                let short_id: String = participant.id.chars().take(8).collect();
                let object_key = format!("{}/{}_{}.pdf", batch_id, sanitize_name(&participant.full_name), short_id);
                state.objects.put(&object_key, pdf).await?;
                log::debug!("Stored {}", object_key);
                certificates.push(IssuedCertificate {
                    participant,
                    object_key,
                });
            }
            Err(e) => {
                log::warn!("Certificate for {} failed: {}", participant.full_name, e);
                errors.push(format!("{}: {}", participant.full_name, e));
            }
        }
    }

    if certificates.is_empty() {
        return Err(AppError::RenderFailure(format!(
            "no certificates could be generated: {}",
            errors.join("; ")
        )));
    }

    state.pointer.set(&batch_id, state.settings.batch_ttl()).await?;
    log::info!(
        "Batch {}: {} certificates generated, {} failed",
        batch_id,
        certificates.len(),
        errors.len()
    );
    Ok(GenerationOutcome::Issued {
        batch_id,
        certificates,
        errors,
    })
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    jobs: web::Data<JobsState>,
    payload: web::Json<GenerateRequest>,
) -> AppResult<HttpResponse> {
    let req = payload.into_inner();
    let event = EventMetadata {
        event_name: req.event_name,
        event_location: req.event_location,
        issue_date: req.issue_date,
    };
    let outcome = match generate(&state, &req.template_id, &event).await {
        Err(AppError::RenderFailure(message)) => {
            return Ok(HttpResponse::InternalServerError().json(failure_response(message)));
        }
        other => other?,
    };
    let mut response = outcome.to_response();

    if let (true, GenerationOutcome::Issued { certificates, .. }) = (req.send_email, &outcome) {
        let deliveries = certificates
            .iter()
            .map(|c| Delivery {
                to: c.participant.email.clone(),
                full_name: c.participant.full_name.clone(),
                object_key: c.object_key.clone(),
            })
            .collect();
        let job_id = schedule_email_job(
            jobs.get_ref().clone(),
            state.objects.clone(),
            state.mailer.clone(),
            deliveries,
        )
        .await;
        log::info!("E-mail job {} scheduled", job_id);
        response.email_job_id = Some(job_id);
    }

    Ok(HttpResponse::Ok().json(response))
}
