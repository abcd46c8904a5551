//! Axum route handlers for the quiz API.

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::cv::extract::{detect_language, extract_pdf_text};
use crate::cv::handlers::is_pdf_upload;
use crate::errors::AppError;
use crate::models::cv::CvRow;
use crate::models::quiz::{
    QuestionRow, QuizRow, ResultRow, QUIZ_STATUS_ACTIVE, QUIZ_STATUS_COMPLETED,
};
use crate::quiz::feedback::feedback_for;
use crate::quiz::generate::generate_questions;
use crate::quiz::scoring::{normalize_answer_payload, score_submission, ScoredAnswer};
use crate::state::AppState;

/// Multipart field names accepted for the CV file, in preference order.
const CV_FIELD_KEYS: [&str; 6] = ["cv", "file", "pdf", "cv_file", "resume", "document"];

const JSON_BODY_LIMIT: usize = 1024 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// A question as exposed to quiz takers. Deliberately omits the correct
/// answer index.
#[derive(Debug, Serialize)]
pub struct QuizQuestionView {
    pub id: i32,
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: String,
    pub skill: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuizResponse {
    pub success: bool,
    pub quiz_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub language: String,
    pub questions: Vec<QuizQuestionView>,
    pub total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub quiz_id: Uuid,
    /// A list of `{question, answer}` records or a map of question text
    /// to answer.
    #[serde(default)]
    pub answers: Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub success: bool,
    pub result_id: Uuid,
    pub quiz_id: Uuid,
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub feedback: String,
    pub answers: Vec<ScoredAnswer>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub success: bool,
    pub result_id: Uuid,
    pub quiz_id: Uuid,
    pub score: f64,
    pub correct: i32,
    pub total: i32,
    pub feedback: String,
    pub answers: Value,
    pub completed_at: chrono::DateTime<Utc>,
}

/// Where the quiz's CV text came from: a stored CV or a fresh upload.
struct QuizSource {
    cv_id: Option<Uuid>,
    cv_text: String,
    language: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/generate/
///
/// Generates a quiz either from a stored CV (JSON body with `cv_id`) or
/// directly from an uploaded PDF (multipart). The quiz and its questions
/// are persisted in one transaction; correct answers never leave the
/// server.
pub async fn handle_generate_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<GenerateQuizResponse>, AppError> {
    let source = resolve_quiz_source(&state, &user, request).await?;

    let generated = generate_questions(&state.llm, &source.cv_text, &source.language).await?;

    if generated.is_empty() {
        return Err(AppError::Generation(
            "No questions were generated".to_string(),
        ));
    }

    let quiz_id = Uuid::new_v4();
    let created_at = Utc::now();
    let title = format!("Quiz {}", created_at.format("%Y-%m-%d"));

    // Quiz and questions land together or not at all.
    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT INTO quizzes (id, user_id, cv_id, title, language, status, total_questions, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(quiz_id)
    .bind(user.id)
    .bind(source.cv_id)
    .bind(&title)
    .bind(&source.language)
    .bind(QUIZ_STATUS_ACTIVE)
    .bind(generated.len() as i32)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    for (index, question) in generated.iter().enumerate() {
        sqlx::query(
            "INSERT INTO questions (id, quiz_id, question_number, text, options,
                                    correct_answer, skill_tag, difficulty)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(index as i32 + 1)
        .bind(&question.text)
        .bind(json!(question.options))
        .bind(question.correct_answer as i32)
        .bind(&question.skill)
        .bind(question.difficulty)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Generated quiz {} ({} questions, language {}) for user {}",
        quiz_id,
        generated.len(),
        source.language,
        user.username
    );

    let questions = generated
        .iter()
        .enumerate()
        .map(|(index, q)| QuizQuestionView {
            id: index as i32 + 1,
            question: q.text.clone(),
            options: q.options.clone(),
            difficulty: q.difficulty.to_string(),
            skill: q.skill.clone(),
        })
        .collect::<Vec<_>>();

    Ok(Json(GenerateQuizResponse {
        success: true,
        quiz_id,
        cv_id: source.cv_id,
        language: source.language,
        total_questions: questions.len(),
        questions,
    }))
}

/// POST /api/ai/submit/
///
/// Scores a submission against the quiz's stored questions, attaches
/// feedback, and persists the result while closing the quiz, both in one
/// transaction.
pub async fn handle_submit_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>, AppError> {
    let submitted = normalize_answer_payload(&request.answers);
    if submitted.is_empty() {
        return Err(AppError::Validation("answers are required".to_string()));
    }

    let quiz = sqlx::query_as::<_, QuizRow>("SELECT * FROM quizzes WHERE id = $1 AND user_id = $2")
        .bind(request.quiz_id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", request.quiz_id)))?;

    let questions = sqlx::query_as::<_, QuestionRow>(
        "SELECT * FROM questions WHERE quiz_id = $1 ORDER BY question_number",
    )
    .bind(quiz.id)
    .fetch_all(&state.db)
    .await?;

    let scored = score_submission(&questions, &submitted);
    let feedback = feedback_for(&state.llm, &scored).await;

    let result_id = Uuid::new_v4();
    let completed_at = Utc::now();

    // Result insert and quiz close succeed or fail together.
    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT INTO results (id, quiz_id, user_id, score, correct_count, total_count,
                              answers, feedback, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(result_id)
    .bind(quiz.id)
    .bind(user.id)
    .bind(scored.score)
    .bind(scored.correct_count as i32)
    .bind(scored.total_count as i32)
    .bind(json!(scored.answers))
    .bind(&feedback)
    .bind(completed_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE quizzes SET status = $1, completed_at = $2 WHERE id = $3")
        .bind(QUIZ_STATUS_COMPLETED)
        .bind(completed_at)
        .bind(quiz.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "Scored quiz {}: {}/{} ({}%) for user {}",
        quiz.id,
        scored.correct_count,
        scored.total_count,
        scored.score,
        user.username
    );

    Ok(Json(SubmitQuizResponse {
        success: true,
        result_id,
        quiz_id: quiz.id,
        score: scored.score,
        correct: scored.correct_count,
        total: scored.total_count,
        feedback,
        answers: scored.answers,
    }))
}

/// GET /api/quiz/results/:id/
///
/// Returns a stored result in the same shape the submit endpoint answers
/// with.
pub async fn handle_get_result(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(result_id): Path<Uuid>,
) -> Result<Json<ResultResponse>, AppError> {
    let result =
        sqlx::query_as::<_, ResultRow>("SELECT * FROM results WHERE id = $1 AND user_id = $2")
            .bind(result_id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Result {result_id} not found")))?;

    Ok(Json(ResultResponse {
        success: true,
        result_id: result.id,
        quiz_id: result.quiz_id,
        score: result.score,
        correct: result.correct_count,
        total: result.total_count,
        feedback: result.feedback,
        answers: result.answers,
        completed_at: result.completed_at,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Quiz source resolution
// ────────────────────────────────────────────────────────────────────────────

/// Dispatches on the request content type: JSON bodies reference a stored
/// CV by `cv_id`, multipart bodies carry a fresh PDF.
async fn resolve_quiz_source(
    state: &AppState,
    user: &CurrentUser,
    request: Request,
) -> Result<QuizSource, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("application/json") {
        let bytes = axum::body::to_bytes(request.into_body(), JSON_BODY_LIMIT)
            .await
            .map_err(|e| AppError::Validation(format!("could not read request body: {e}")))?;

        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;

        let cv_id = payload
            .get("cv_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::Validation("cv_id is required in JSON requests".to_string())
            })?;

        let cv = sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE id = $1 AND user_id = $2")
            .bind(cv_id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("CV {cv_id} not found")))?;

        return Ok(QuizSource {
            cv_id: Some(cv.id),
            cv_text: cv.cv_text,
            language: cv.detected_language,
        });
    }

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?;

        return read_quiz_upload(multipart).await;
    }

    Err(AppError::Validation(
        "Please upload a valid PDF file or provide cv_id".to_string(),
    ))
}

/// Accepts the CV file under any of `CV_FIELD_KEYS`, honoring the key
/// preference order when several are present.
async fn read_quiz_upload(mut multipart: Multipart) -> Result<QuizSource, AppError> {
    let mut files: Vec<(String, String, Option<String>, bytes::Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("invalid multipart payload: {e}"))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if !CV_FIELD_KEYS.contains(&name.as_str()) {
            continue;
        }
        let filename = field.file_name().unwrap_or("cv.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            AppError::Validation(format!("invalid multipart payload: {e}"))
        })?;
        files.push((name, filename, content_type, data));
    }

    let (_, filename, content_type, data) = CV_FIELD_KEYS
        .iter()
        .find_map(|key| files.iter().find(|(name, ..)| name == key))
        .cloned()
        .ok_or_else(|| {
            AppError::Validation("Please upload a valid PDF file or provide cv_id".to_string())
        })?;

    if !is_pdf_upload(&filename, content_type.as_deref()) {
        return Err(AppError::Validation(
            "only PDF files are accepted".to_string(),
        ));
    }

    let cv_text = extract_pdf_text(&data)?;
    let language = detect_language(&cv_text).to_string();

    Ok(QuizSource {
        cv_id: None,
        cv_text,
        language,
    })
}
