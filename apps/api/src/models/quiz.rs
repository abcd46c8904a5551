use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Quiz lifecycle: "active" until a submission lands, then "completed".
pub const QUIZ_STATUS_ACTIVE: &str = "active";
pub const QUIZ_STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub title: String,
    pub language: String,
    pub status: String,
    pub total_questions: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    /// 1-based position within the quiz; scoring pairs answers by this order.
    pub question_number: i32,
    pub text: String,
    /// JSON array of 4 option strings.
    pub options: Value,
    /// Index into `options`.
    pub correct_answer: i32,
    pub skill_tag: String,
    pub difficulty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResultRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    /// Percentage, 0.0 to 100.0, rounded to two decimals.
    pub score: f64,
    pub correct_count: i32,
    pub total_count: i32,
    /// JSON array of per-question records: question, selected, correct,
    /// is_correct, skill.
    pub answers: Value,
    pub feedback: String,
    pub completed_at: DateTime<Utc>,
}
