//! Axum route handlers for the voice interview API.

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::errors::AppError;
use crate::llm::prompts::{
    build_interview_eval_prompt, build_interview_questions_prompt, INTERVIEW_EVAL_PARAMS,
    INTERVIEW_QUESTIONS_PARAMS,
};
use crate::llm::LlmClient;
use crate::models::cv::CvRow;
use crate::models::interview::InterviewRow;
use crate::state::AppState;

/// How long the candidate gets to answer, in seconds.
const INTERVIEW_DURATION_SECS: i32 = 180;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    pub cv_id: Uuid,
    pub result_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub success: bool,
    pub interview_id: Uuid,
    pub questions: Vec<String>,
    pub language: String,
    pub duration_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct InterviewEvaluation {
    pub soft_skills_score: i32,
    pub communication_score: i32,
    pub confidence_score: i32,
    pub feedback: String,
    pub suggestions: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitInterviewResponse {
    pub success: bool,
    pub interview_id: Uuid,
    pub transcription: String,
    /// `None` when transcription or evaluation was unavailable.
    pub evaluation: Option<InterviewEvaluation>,
    pub status: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/interview/start/
///
/// Generates spoken-interview questions from a stored CV and opens an
/// interview session.
pub async fn handle_start_interview(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<StartInterviewRequest>,
) -> Result<Json<StartInterviewResponse>, AppError> {
    let cv = sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE id = $1 AND user_id = $2")
        .bind(request.cv_id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {} not found", request.cv_id)))?;

    let questions =
        generate_interview_questions(&state.llm, &cv.cv_text, &cv.detected_language).await?;

    if questions.is_empty() {
        return Err(AppError::Generation(
            "No interview questions were generated".to_string(),
        ));
    }

    let interview_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO interviews (id, user_id, cv_id, result_id, questions, language,
                                 duration_seconds, started_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(interview_id)
    .bind(user.id)
    .bind(cv.id)
    .bind(request.result_id)
    .bind(json!(questions))
    .bind(&cv.detected_language)
    .bind(INTERVIEW_DURATION_SECS)
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    tracing::info!(
        "Started interview {} ({} questions) for user {}",
        interview_id,
        questions.len(),
        user.username
    );

    Ok(Json(StartInterviewResponse {
        success: true,
        interview_id,
        questions,
        language: cv.detected_language,
        duration_seconds: INTERVIEW_DURATION_SECS,
    }))
}

/// POST /api/ai/interview/submit/
///
/// Takes the recorded answer (`audio` field) for an open interview,
/// transcribes and evaluates it. Transcription failures produce an empty
/// transcription and no evaluation rather than an error; the interview
/// still completes.
pub async fn handle_submit_interview(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<SubmitInterviewResponse>, AppError> {
    let mut interview_id = None;
    let mut audio = None;
    let mut audio_filename = "answer.webm".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("invalid multipart payload: {e}"))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "interview_id" => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("invalid multipart payload: {e}"))
                })?;
                interview_id = Uuid::parse_str(text.trim()).ok();
            }
            "audio" => {
                if let Some(filename) = field.file_name() {
                    audio_filename = filename.to_string();
                }
                audio = Some(field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("invalid multipart payload: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let interview_id = interview_id
        .ok_or_else(|| AppError::Validation("interview_id is required".to_string()))?;
    let audio = audio.ok_or_else(|| {
        AppError::Validation("missing 'audio' field in multipart body".to_string())
    })?;

    let interview = sqlx::query_as::<_, InterviewRow>(
        "SELECT * FROM interviews WHERE id = $1 AND user_id = $2",
    )
    .bind(interview_id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Interview {interview_id} not found")))?;

    let transcription = match state
        .transcriber
        .transcribe(audio.to_vec(), &audio_filename)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("Transcription failed ({e}), completing interview without it");
            String::new()
        }
    };

    let evaluation = if transcription.is_empty() {
        None
    } else {
        evaluate_interview(&state.llm, &interview.question_list(), &transcription).await
    };

    sqlx::query(
        "UPDATE interviews
         SET transcription = $1, soft_skills_score = $2, communication_score = $3,
             confidence_score = $4, feedback = $5, suggestions = $6, completed_at = $7
         WHERE id = $8",
    )
    .bind(&transcription)
    .bind(evaluation.as_ref().map(|e| e.soft_skills_score))
    .bind(evaluation.as_ref().map(|e| e.communication_score))
    .bind(evaluation.as_ref().map(|e| e.confidence_score))
    .bind(evaluation.as_ref().map(|e| e.feedback.clone()))
    .bind(evaluation.as_ref().map(|e| e.suggestions.clone()))
    .bind(Utc::now())
    .bind(interview.id)
    .execute(&state.db)
    .await?;

    Ok(Json(SubmitInterviewResponse {
        success: true,
        interview_id: interview.id,
        transcription,
        evaluation,
        status: "completed".to_string(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// LLM steps
// ────────────────────────────────────────────────────────────────────────────

async fn generate_interview_questions(
    llm: &LlmClient,
    cv_text: &str,
    language: &str,
) -> Result<Vec<String>, AppError> {
    let prompt = build_interview_questions_prompt(cv_text, language);

    let questions: Vec<Value> = llm
        .call_json(&prompt, INTERVIEW_QUESTIONS_PARAMS)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(questions
        .iter()
        .filter_map(Value::as_str)
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect())
}

/// Evaluation degrades to `None` on any model failure.
async fn evaluate_interview(
    llm: &LlmClient,
    questions: &[String],
    transcription: &str,
) -> Option<InterviewEvaluation> {
    let prompt = build_interview_eval_prompt(questions, transcription);

    match llm.call_json::<Value>(&prompt, INTERVIEW_EVAL_PARAMS).await {
        Ok(parsed) => Some(evaluation_from_value(&parsed)),
        Err(e) => {
            warn!("Interview evaluation failed ({e}), completing without scores");
            None
        }
    }
}

fn evaluation_from_value(parsed: &Value) -> InterviewEvaluation {
    InterviewEvaluation {
        soft_skills_score: score_field(parsed, "soft_skills_score"),
        communication_score: score_field(parsed, "communication_score"),
        confidence_score: score_field(parsed, "confidence_score"),
        feedback: text_field(parsed, "feedback"),
        suggestions: text_field(parsed, "suggestions"),
    }
}

fn score_field(parsed: &Value, key: &str) -> i32 {
    parsed
        .get(key)
        .and_then(Value::as_i64)
        .map(|n| n.clamp(0, 100) as i32)
        .unwrap_or(0)
}

fn text_field(parsed: &Value, key: &str) -> String {
    parsed
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_from_value_clamps_scores() {
        let parsed = json!({
            "soft_skills_score": 150,
            "communication_score": -20,
            "confidence_score": 85,
            "feedback": "Clear and confident.",
            "suggestions": "Slow down a little."
        });
        let evaluation = evaluation_from_value(&parsed);
        assert_eq!(evaluation.soft_skills_score, 100);
        assert_eq!(evaluation.communication_score, 0);
        assert_eq!(evaluation.confidence_score, 85);
        assert_eq!(evaluation.feedback, "Clear and confident.");
    }

    #[test]
    fn test_evaluation_from_value_tolerates_missing_keys() {
        let evaluation = evaluation_from_value(&json!({}));
        assert_eq!(evaluation.soft_skills_score, 0);
        assert!(evaluation.feedback.is_empty());
    }
}
