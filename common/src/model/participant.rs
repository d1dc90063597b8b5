use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROLE: &str = "participant";

/// One roster entry. `full_name` is never empty for stored participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub place: Option<i64>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantList {
    pub participants: Vec<Participant>,
    pub total: usize,
}

/// Response of `POST /api/v1/participants/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub count: usize,
    pub participants: Vec<Participant>,
    pub errors: Vec<String>,
    /// MD5 of the uploaded file, hex encoded.
    pub checksum: String,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}
