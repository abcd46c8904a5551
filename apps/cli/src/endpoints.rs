//! Typed endpoint calls on `ApiClient`.
//!
//! Each method owns one server interaction: request shape, response
//! parsing, and the session bookkeeping that later commands rely on
//! (cached CV, quiz, and result ids). Older deployments expose the CV
//! routes under different paths and multipart field names, so uploads
//! run a fallback chain instead of a single request.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::aggregate::AnswerRecord;
use crate::attempts::{try_in_order, Attempt};
use crate::guard;
use crate::http::{ApiClient, ApiRequest, ClientError, MultipartField};
use crate::quiz::{normalize_questions, Question};

const LOGIN_PATH: &str = "api/token/";
const REGISTER_PATH: &str = "api/users/register/";
const CV_UPLOAD_PATH: &str = "api/cv/upload/";
const CV_CREATE_PATH: &str = "api/cv/";
const GENERATE_PATH: &str = "api/ai/generate/";
const SUBMIT_PATH: &str = "api/ai/submit/";
const INTERVIEW_START_PATH: &str = "api/ai/interview/start/";
const INTERVIEW_SUBMIT_PATH: &str = "api/ai/interview/submit/";
const REPORT_PATH: &str = "api/ai/report/pdf/";

/// Multipart field names servers accept for the CV file, tried in order.
const CV_FIELD_KEYS: [&str; 6] = ["cv", "file", "pdf", "cv_file", "resume", "document"];

const PDF_ONLY_MESSAGE: &str = "Please choose a PDF file.";

// ────────────────────────────────────────────
// Payload types
// ────────────────────────────────────────────

/// A local file picked for upload.
#[derive(Debug, Clone)]
pub struct CvFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    name: String,
    tokens: TokenPair,
}

#[derive(Debug)]
pub struct UploadedCv {
    pub cv_id: String,
    pub detected_language: String,
    pub extracted_name: Option<String>,
    pub extracted_phone: Option<String>,
    pub extracted_city: Option<String>,
    pub ip_detected_city: Option<String>,
    pub job_titles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuizOutcome {
    pub result_id: String,
    pub quiz_id: String,
    pub score: f64,
    pub correct: u32,
    pub total: u32,
    pub feedback: String,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Deserialize)]
pub struct StartedInterview {
    pub interview_id: String,
    pub questions: Vec<String>,
    pub duration_seconds: u32,
}

#[derive(Debug, Deserialize)]
pub struct InterviewScores {
    pub soft_skills_score: i32,
    pub communication_score: i32,
    pub confidence_score: i32,
    pub feedback: String,
    pub suggestions: String,
}

#[derive(Debug, Deserialize)]
pub struct InterviewOutcome {
    pub interview_id: String,
    pub transcription: String,
    pub evaluation: Option<InterviewScores>,
    pub status: String,
}

// ────────────────────────────────────────────
// Endpoint methods
// ────────────────────────────────────────────

impl ApiClient {
    /// Credential login. On success both tokens are stored atomically;
    /// on failure the session is untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post_json(
            LOGIN_PATH,
            json!({ "username": username, "password": password }),
        );
        let response = self.send_unauthenticated(request).await?;

        let tokens: TokenPair = response.json()?;
        self.session.set_token_pair(&tokens.access, &tokens.refresh)?;
        self.session.set_display_name(username)?;
        Ok(())
    }

    /// Creates an account; the server signs the new user in immediately.
    pub async fn register(
        &self,
        username: &str,
        name: Option<&str>,
        password: &str,
    ) -> Result<String, ClientError> {
        let body = json!({
            "username": username,
            "name": name.unwrap_or(""),
            "password": password,
            "confirm_password": password,
        });
        let response = self
            .send_unauthenticated(ApiRequest::post_json(REGISTER_PATH, body))
            .await?;

        let parsed: RegisterResponse = response.json()?;
        self.session
            .set_token_pair(&parsed.tokens.access, &parsed.tokens.refresh)?;
        self.session.set_display_name(&parsed.name)?;
        Ok(parsed.name)
    }

    /// Drops the stored tokens; cached ids survive for the next login.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear_tokens()?;
        Ok(())
    }

    /// Uploads a CV PDF. Non-PDF files are rejected locally before any
    /// request goes out. Tries the dedicated upload route first and falls
    /// back to the resource-style create when the route is absent.
    pub async fn upload_cv(
        &self,
        file: CvFile,
        title: Option<&str>,
    ) -> Result<UploadedCv, ClientError> {
        guard::require_auth(&self.session)?;

        if !is_pdf_file(&file.filename, file.content_type.as_deref()) {
            return Err(ClientError::Validation(PDF_ONLY_MESSAGE.to_string()));
        }

        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/pdf".to_string());
        let file_field =
            MultipartField::file("file", &file.filename, &content_type, file.bytes.clone());

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&file.filename)
            .to_string();

        let primary = ApiRequest::post_multipart(CV_UPLOAD_PATH, vec![file_field.clone()]);
        let fallback = ApiRequest::post_multipart(
            CV_CREATE_PATH,
            vec![MultipartField::text("title", &title), file_field],
        );

        let response = try_in_order(
            vec![
                Attempt::new("cv upload", self.send(primary)),
                Attempt::new("cv create", self.send(fallback)),
            ],
            upload_route_missing,
        )
        .await?;

        let value: Value = response.json()?;
        let cv = parse_uploaded_cv(&value)?;

        self.session.set_last_cv_id(&cv.cv_id)?;
        if !cv.detected_language.is_empty() {
            self.session.set_language(&cv.detected_language)?;
        }
        Ok(cv)
    }

    /// Corrects extracted contact fields on the cached CV and marks it
    /// confirmed.
    pub async fn confirm_cv(
        &self,
        name: Option<&str>,
        phone: Option<&str>,
        city: Option<&str>,
    ) -> Result<String, ClientError> {
        guard::require_auth(&self.session)?;
        let cv_id = guard::require_cv(&self.session)?;

        let body = json!({ "name": name, "phone": phone, "city": city });
        let response = self
            .send(ApiRequest::post_json(
                &format!("{CV_CREATE_PATH}{cv_id}/confirm/"),
                body,
            ))
            .await?;

        let value: Value = response.json()?;
        Ok(value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("information confirmed")
            .to_string())
    }

    /// Generates a quiz from the cached CV, or from a fresh PDF when one
    /// is given. The fresh-file path tries every known field name until
    /// the server takes one. The new quiz id and language land in the
    /// session for the submit that follows.
    pub async fn generate_quiz(
        &self,
        file: Option<CvFile>,
    ) -> Result<Vec<Question>, ClientError> {
        guard::require_auth(&self.session)?;

        let response = match file {
            None => {
                let cv_id = guard::require_cv(&self.session)?;
                self.send(ApiRequest::post_json(
                    GENERATE_PATH,
                    json!({ "cv_id": cv_id }),
                ))
                .await?
            }
            Some(file) => {
                if !is_pdf_file(&file.filename, file.content_type.as_deref()) {
                    return Err(ClientError::Validation(PDF_ONLY_MESSAGE.to_string()));
                }
                let content_type = file
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/pdf".to_string());

                let attempts = CV_FIELD_KEYS
                    .iter()
                    .map(|key| {
                        let request = ApiRequest::post_multipart(
                            GENERATE_PATH,
                            vec![MultipartField::file(
                                key,
                                &file.filename,
                                &content_type,
                                file.bytes.clone(),
                            )],
                        );
                        Attempt::new(*key, self.send(request))
                    })
                    .collect();

                try_in_order(attempts, |_| true).await?
            }
        };

        let value: Value = response.json()?;
        let questions = normalize_questions(&value);
        if questions.is_empty() {
            return Err(ClientError::EmptyGeneration);
        }

        if let Some(id) = id_field(&value, &["quiz_id", "quizId", "id"]) {
            self.session.set_last_quiz_id(&id)?;
        }
        if let Some(language) = str_field(&value, "language") {
            self.session.set_language(&language)?;
        }

        Ok(questions)
    }

    /// Submits quiz answers and caches the result id for `results` and
    /// the report.
    pub async fn submit_answers(&self, answers: Vec<Value>) -> Result<QuizOutcome, ClientError> {
        guard::require_auth(&self.session)?;
        let quiz_id = self.session.last_quiz_id().ok_or_else(|| {
            ClientError::Validation("no quiz in progress; run `vericv quiz` first".to_string())
        })?;

        let request = ApiRequest::post_json(
            SUBMIT_PATH,
            json!({ "quiz_id": quiz_id, "answers": answers }),
        );
        let response = self.send(request).await?;

        let outcome: QuizOutcome = response.json()?;
        self.session.set_last_result_id(&outcome.result_id)?;
        Ok(outcome)
    }

    /// Fetches a stored result, defaulting to the most recent one.
    pub async fn fetch_result(&self, result_id: Option<&str>) -> Result<QuizOutcome, ClientError> {
        guard::require_auth(&self.session)?;
        let id = match result_id {
            Some(id) => id.to_string(),
            None => self.session.last_result_id().ok_or_else(|| {
                ClientError::Validation(
                    "no result on file; submit a quiz or pass a result id".to_string(),
                )
            })?,
        };

        let response = self
            .send(ApiRequest::get(&format!("api/quiz/results/{id}/")))
            .await?;
        Ok(response.json()?)
    }

    /// Opens a voice interview for the cached CV, linking the latest quiz
    /// result when there is one.
    pub async fn start_interview(&self) -> Result<StartedInterview, ClientError> {
        guard::require_auth(&self.session)?;
        let cv_id = guard::require_cv(&self.session)?;

        let mut body = json!({ "cv_id": cv_id });
        if let Some(result_id) = self.session.last_result_id() {
            body["result_id"] = json!(result_id);
        }

        let response = self
            .send(ApiRequest::post_json(INTERVIEW_START_PATH, body))
            .await?;
        Ok(response.json()?)
    }

    /// Sends the recorded answer for an open interview.
    pub async fn submit_interview(
        &self,
        interview_id: &str,
        audio_filename: &str,
        audio: Vec<u8>,
    ) -> Result<InterviewOutcome, ClientError> {
        guard::require_auth(&self.session)?;

        let fields = vec![
            MultipartField::text("interview_id", interview_id),
            MultipartField::file(
                "audio",
                audio_filename,
                audio_content_type(audio_filename),
                audio,
            ),
        ];
        let response = self
            .send(ApiRequest::post_multipart(INTERVIEW_SUBMIT_PATH, fields))
            .await?;
        Ok(response.json()?)
    }

    /// Downloads the assessment report PDF for the cached CV.
    pub async fn download_report(
        &self,
        interview_id: Option<&str>,
    ) -> Result<Bytes, ClientError> {
        guard::require_auth(&self.session)?;
        let cv_id = guard::require_cv(&self.session)?;

        let mut body = json!({ "cv_id": cv_id });
        if let Some(result_id) = self.session.last_result_id() {
            body["result_id"] = json!(result_id);
        }
        if let Some(id) = interview_id {
            body["interview_id"] = json!(id);
        }

        let response = self.send(ApiRequest::post_json(REPORT_PATH, body)).await?;
        Ok(response.body)
    }
}

// ────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────

/// Same gate the server applies, run before any bytes leave the machine.
pub fn is_pdf_file(filename: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || filename.to_lowercase().ends_with(".pdf")
}

fn upload_route_missing(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Api {
            status: 404 | 405,
            ..
        }
    )
}

fn audio_content_type(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".ogg") {
        "audio/ogg"
    } else if lower.ends_with(".m4a") {
        "audio/mp4"
    } else {
        "audio/webm"
    }
}

fn parse_uploaded_cv(value: &Value) -> Result<UploadedCv, ClientError> {
    let cv_id = id_field(value, &["cv_id", "id", "cvId"]).ok_or_else(|| {
        ClientError::Validation("server response did not include a CV id".to_string())
    })?;

    Ok(UploadedCv {
        cv_id,
        detected_language: str_field(value, "detected_language").unwrap_or_default(),
        extracted_name: str_field(value, "extracted_name"),
        extracted_phone: str_field(value, "extracted_phone"),
        extracted_city: str_field(value, "extracted_city"),
        ip_detected_city: str_field(value, "ip_detected_city"),
        job_titles: value
            .get("job_titles")
            .and_then(Value::as_array)
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Reads an id that may arrive under several keys, as string or number.
fn id_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
