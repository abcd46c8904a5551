//! Axum route handlers for the CV API.

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::cv::extract::{detect_language, extract_fields, extract_pdf_text};
use crate::cv::geo::{client_ip, detect_city};
use crate::errors::AppError;
use crate::models::cv::CvRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadCvResponse {
    pub success: bool,
    pub cv_id: Uuid,
    pub filename: String,
    pub extracted_name: Option<String>,
    pub extracted_phone: Option<String>,
    pub extracted_city: Option<String>,
    pub ip_detected_city: Option<String>,
    pub detected_language: String,
    pub job_titles: Vec<String>,
}

/// Response for the resource-style create endpoint. Identifies the CV
/// under `id` rather than `cv_id`; clients accept either key.
#[derive(Debug, Serialize)]
pub struct CreateCvResponse {
    pub id: Uuid,
    pub title: String,
    pub filename: String,
    pub extracted_name: Option<String>,
    pub extracted_phone: Option<String>,
    pub extracted_city: Option<String>,
    pub ip_detected_city: Option<String>,
    pub detected_language: String,
    pub job_titles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmInfoRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmInfoResponse {
    pub success: bool,
    pub status: String,
    pub cv_id: Uuid,
}

/// One `file` part plus optional `title`, pulled out of a multipart body.
struct PdfUpload {
    filename: String,
    data: Bytes,
    title: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/cv/upload/
///
/// Accepts a PDF under the `file` field, extracts its text and contact
/// fields, and stores the CV. The PDF itself is not retained.
pub async fn handle_upload_cv(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadCvResponse>, AppError> {
    let upload = read_pdf_upload(multipart).await?;
    let cv = ingest_cv(&state, &user, &headers, upload).await?;

    Ok(Json(UploadCvResponse {
        success: true,
        cv_id: cv.id,
        filename: cv.filename.clone(),
        extracted_name: cv.extracted_name.clone(),
        extracted_phone: cv.extracted_phone.clone(),
        extracted_city: cv.extracted_city.clone(),
        ip_detected_city: cv.ip_detected_city.clone(),
        detected_language: cv.detected_language.clone(),
        job_titles: cv.job_titles(),
    }))
}

/// POST /api/cv/
///
/// Resource-style create: `title` and `file` fields. Same pipeline as
/// /api/cv/upload/, different response shape.
pub async fn handle_create_cv(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<CreateCvResponse>, AppError> {
    let upload = read_pdf_upload(multipart).await?;
    let cv = ingest_cv(&state, &user, &headers, upload).await?;

    Ok(Json(CreateCvResponse {
        id: cv.id,
        title: cv.title.clone(),
        filename: cv.filename.clone(),
        extracted_name: cv.extracted_name.clone(),
        extracted_phone: cv.extracted_phone.clone(),
        extracted_city: cv.extracted_city.clone(),
        ip_detected_city: cv.ip_detected_city.clone(),
        detected_language: cv.detected_language.clone(),
        job_titles: cv.job_titles(),
    }))
}

/// POST /api/cv/:id/confirm/
///
/// Lets the user correct extracted contact info and marks the CV
/// confirmed. Re-confirming is idempotent.
pub async fn handle_confirm_info(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(cv_id): Path<Uuid>,
    Json(request): Json<ConfirmInfoRequest>,
) -> Result<Json<ConfirmInfoResponse>, AppError> {
    let updated = sqlx::query(
        "UPDATE cvs
         SET extracted_name = COALESCE($1, extracted_name),
             extracted_phone = COALESCE($2, extracted_phone),
             extracted_city = COALESCE($3, extracted_city),
             info_confirmed = TRUE
         WHERE id = $4 AND user_id = $5",
    )
    .bind(request.name.as_deref().map(str::trim))
    .bind(request.phone.as_deref().map(str::trim))
    .bind(request.city.as_deref().map(str::trim))
    .bind(cv_id)
    .bind(user.id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("CV {cv_id} not found")));
    }

    Ok(Json(ConfirmInfoResponse {
        success: true,
        status: "information confirmed".to_string(),
        cv_id,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Shared pipeline
// ────────────────────────────────────────────────────────────────────────────

/// True when the upload claims to be a PDF, by declared content type or
/// file extension.
pub fn is_pdf_upload(filename: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || filename.to_lowercase().ends_with(".pdf")
}

async fn read_pdf_upload(mut multipart: Multipart) -> Result<PdfUpload, AppError> {
    let mut filename = None;
    let mut content_type = None;
    let mut data = None;
    let mut title = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                data = Some(field.bytes().await.map_err(bad_multipart)?);
            }
            "title" => title = Some(field.text().await.map_err(bad_multipart)?),
            _ => {}
        }
    }

    let data = data.ok_or_else(|| {
        AppError::Validation("missing 'file' field in multipart body".to_string())
    })?;
    let filename = filename.unwrap_or_else(|| "cv.pdf".to_string());

    if !is_pdf_upload(&filename, content_type.as_deref()) {
        return Err(AppError::Validation(
            "only PDF files are accepted".to_string(),
        ));
    }

    Ok(PdfUpload {
        filename,
        data,
        title,
    })
}

async fn ingest_cv(
    state: &AppState,
    user: &CurrentUser,
    headers: &HeaderMap,
    upload: PdfUpload,
) -> Result<CvRow, AppError> {
    let cv_text = extract_pdf_text(&upload.data)?;
    let detected_language = detect_language(&cv_text).to_string();
    let fields = extract_fields(&state.llm, &cv_text).await;

    let ip_detected_city = match client_ip(headers) {
        Some(ip) => detect_city(&state.http, &ip).await,
        None => None,
    };

    let cv = CvRow {
        id: Uuid::new_v4(),
        user_id: user.id,
        title: upload
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| upload.filename.clone()),
        filename: upload.filename,
        cv_text,
        detected_language,
        extracted_name: non_empty(fields.name),
        extracted_phone: non_empty(fields.phone),
        extracted_city: non_empty(fields.city),
        extracted_job_titles: json!(fields.job_titles),
        ip_detected_city,
        info_confirmed: false,
        uploaded_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO cvs (id, user_id, title, filename, cv_text, detected_language,
                          extracted_name, extracted_phone, extracted_city,
                          extracted_job_titles, ip_detected_city, info_confirmed, uploaded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(cv.id)
    .bind(cv.user_id)
    .bind(&cv.title)
    .bind(&cv.filename)
    .bind(&cv.cv_text)
    .bind(&cv.detected_language)
    .bind(&cv.extracted_name)
    .bind(&cv.extracted_phone)
    .bind(&cv.extracted_city)
    .bind(&cv.extracted_job_titles)
    .bind(&cv.ip_detected_city)
    .bind(cv.info_confirmed)
    .bind(cv.uploaded_at)
    .execute(&state.db)
    .await?;

    tracing::info!(
        "Stored CV {} for user {} ({} chars, language {})",
        cv.id,
        user.username,
        cv.cv_text.len(),
        cv.detected_language
    );

    Ok(cv)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("invalid multipart payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_upload_by_content_type() {
        assert!(is_pdf_upload("resume", Some("application/pdf")));
    }

    #[test]
    fn test_is_pdf_upload_by_extension() {
        assert!(is_pdf_upload("resume.PDF", None));
        assert!(is_pdf_upload("resume.pdf", Some("application/octet-stream")));
    }

    #[test]
    fn test_is_pdf_upload_rejects_other_files() {
        assert!(!is_pdf_upload("notes.txt", Some("text/plain")));
        assert!(!is_pdf_upload("photo.png", None));
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  Riyadh ".to_string()), Some("Riyadh".to_string()));
        assert_eq!(non_empty("   ".to_string()), None);
    }
}
