use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Uuid,
    pub result_id: Option<Uuid>,
    /// JSON array of question strings.
    pub questions: Value,
    pub language: String,
    pub duration_seconds: i32,
    pub transcription: Option<String>,
    pub soft_skills_score: Option<i32>,
    pub communication_score: Option<i32>,
    pub confidence_score: Option<i32>,
    pub feedback: Option<String>,
    pub suggestions: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InterviewRow {
    pub fn question_list(&self) -> Vec<String> {
        self.questions
            .as_array()
            .map(|qs| {
                qs.iter()
                    .filter_map(|q| q.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
