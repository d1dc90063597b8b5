use crate::model::timestamp::{epoch_seconds, epoch_seconds_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Markup flavour of a certificate template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Html,
    Svg,
}

impl TemplateType {
    pub fn extension(self) -> &'static str {
        match self {
            TemplateType::Html => "html",
            TemplateType::Svg => "svg",
        }
    }

    /// Guesses the type from a file name, `None` for anything that is not markup.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".svg") {
            Some(TemplateType::Svg)
        } else if lower.ends_with(".html") || lower.ends_with(".htm") {
            Some(TemplateType::Html)
        } else {
            None
        }
    }
}

/// Stored metadata of a template. The markup itself lives behind `content_ref`,
/// which is either a filesystem path or an object-store key under `templates/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    #[serde(alias = "content_path")]
    pub content_ref: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub has_images: bool,
    #[serde(default)]
    pub image_count: u32,
    #[serde(with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "epoch_seconds_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload of `POST /api/v1/templates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub template_type: TemplateType,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Payload of `PUT /api/v1/templates/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub variables: Option<Vec<String>>,
}

/// Template metadata together with its markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateWithContent {
    #[serde(flatten)]
    pub record: TemplateRecord,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateList {
    pub templates: Vec<TemplateRecord>,
    pub total: usize,
}

fn default_type() -> TemplateType {
    TemplateType::Html
}
