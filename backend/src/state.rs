//! Application state shared by every handler through `web::Data`.

use std::sync::Arc;

use crate::config::Settings;
use crate::services::email::EmailSender;
use crate::services::render::Renderer;
use crate::storage::records::{BatchPointer, ParticipantRepo, TemplateRepo};
use crate::storage::{MetadataStore, ObjectStore};

pub struct AppState {
    pub settings: Settings,
    pub templates: TemplateRepo,
    pub participants: ParticipantRepo,
    pub pointer: BatchPointer,
    pub objects: Arc<dyn ObjectStore>,
    pub renderer: Arc<dyn Renderer>,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        kv: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        renderer: Arc<dyn Renderer>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        AppState {
            settings,
            templates: TemplateRepo::new(kv.clone()),
            participants: ParticipantRepo::new(kv.clone()),
            pointer: BatchPointer::new(kv),
            objects,
            renderer,
            mailer,
        }
    }
}
