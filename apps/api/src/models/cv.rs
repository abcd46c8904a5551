use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored CV. Only the extracted text is retained; the uploaded PDF
/// itself is discarded after extraction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub filename: String,
    pub cv_text: String,
    /// "en" or "ar", from Arabic-script ratio detection.
    pub detected_language: String,
    pub extracted_name: Option<String>,
    pub extracted_phone: Option<String>,
    pub extracted_city: Option<String>,
    /// JSON array of strings, at most 3 entries.
    pub extracted_job_titles: Value,
    pub ip_detected_city: Option<String>,
    pub info_confirmed: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl CvRow {
    pub fn job_titles(&self) -> Vec<String> {
        self.extracted_job_titles
            .as_array()
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
