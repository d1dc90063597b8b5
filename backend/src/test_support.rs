//! Fixtures shared by unit and route tests.

use chrono::Utc;
use common::model::participant::Participant;
use common::model::template::{TemplateRecord, TemplateType};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::config::Settings;
use crate::job_controller::state::{start_job_updater, JobsState};
use crate::services::email::LogMailer;
use crate::services::render::{substitute, RenderError, Renderer, Variables};
use crate::state::AppState;
use crate::storage::fs_objects::FsObjectStore;
use crate::storage::sqlite_kv::SqliteMetadataStore;

/// Renders the substituted markup as the "PDF" and fails for chosen names.
pub struct FakeRenderer {
    fail_for: HashSet<String>,
}

impl Renderer for FakeRenderer {
    fn render(&self, _kind: TemplateType, markup: &str, variables: &Variables) -> Result<Vec<u8>, RenderError> {
        let name = variables.get("participant_name").cloned().unwrap_or_default();
        if self.fail_for.contains(&name) {
            return Err(RenderError::Pdf(format!("cannot lay out {name}")));
        }
        Ok(format!("%PDF-fake\n{}", substitute(markup, variables)).into_bytes())
    }
}

pub struct TestEnv {
    pub state: Arc<AppState>,
    pub jobs: JobsState,
    _dir: TempDir,
}

impl TestEnv {
    /// In-memory metadata, a temporary bucket and a renderer that fails for
    /// the given participant names. Must be called inside a tokio runtime.
    pub fn new(fail_for: &[&str]) -> Self {
        Self::with_renderer(Arc::new(FakeRenderer {
            fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
        }))
    }

    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database_path: ":memory:".to_string(),
            bucket_dir: dir.path().join("bucket"),
            templates_dir: dir.path().join("templates"),
            fonts_dir: dir.path().join("fonts"),
            ..Settings::default()
        };
        let kv = Arc::new(SqliteMetadataStore::open(":memory:").unwrap());
        let objects = Arc::new(FsObjectStore::open(dir.path().join("bucket")).unwrap());
        let state = AppState::new(settings, kv, objects, renderer, Arc::new(LogMailer));

        let (jobs, rx) = JobsState::new();
        tokio::spawn(start_job_updater(jobs.clone(), rx));

        TestEnv {
            state: Arc::new(state),
            jobs,
            _dir: dir,
        }
    }

    pub async fn seed_participants(&self, names: &[&str]) -> Vec<Participant> {
        let mut out = Vec::new();
        for name in names {
            let participant = Participant {
                id: Uuid::new_v4().to_string(),
                full_name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                role: "participant".to_string(),
                place: None,
                uploaded_at: Some(Utc::now()),
            };
            self.state.participants.save(&participant, None).await.unwrap();
            out.push(participant);
        }
        out
    }

    pub async fn seed_template(&self, markup: &str) -> TemplateRecord {
        let id = Uuid::new_v4().to_string();
        let path = self.state.settings.templates_dir.join(format!("{id}.html"));
        tokio::fs::create_dir_all(&self.state.settings.templates_dir).await.unwrap();
        tokio::fs::write(&path, markup).await.unwrap();
        let record = TemplateRecord {
            id,
            name: "Seeded".to_string(),
            template_type: TemplateType::Html,
            content_ref: path.to_string_lossy().into_owned(),
            variables: crate::services::render::extract_variables(markup),
            has_images: false,
            image_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.state.templates.save(&record).await.unwrap();
        record
    }
}

/// Builds a `multipart/form-data` body. Returns the content type and bytes.
pub fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "certgen-test-boundary";
    let mut body = Vec::new();
    for (name, filename, data) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes()),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
