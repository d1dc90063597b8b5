use actix_web::{web, HttpResponse, Responder};

use crate::state::AppState;

pub(crate) async fn process(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": state.settings.service_name,
    }))
}
