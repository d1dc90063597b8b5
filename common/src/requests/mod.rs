use serde::{Deserialize, Serialize};

/// Request payload for `POST /api/v1/certificates/generate`.
///
/// `template_id` is matched loosely: besides the stored id it may be an id
/// prefix, a client-side creation timestamp, part of the content path or the
/// template name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub template_id: String,
    pub event_name: String,
    pub event_location: String,
    pub issue_date: String,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateStatus {
    Success,
    Warning,
    Error,
}

/// Response of a generation run.
///
/// `Success` means at least one certificate was produced, not that all were:
/// a partially failed run still reports `Success` with `errors` filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub status: GenerateStatus,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted_count: usize,
}

/// Query string of the certificate preview endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewQuery {
    pub template_id: String,
    pub event_name: Option<String>,
    pub event_location: Option<String>,
    pub issue_date: Option<String>,
}
