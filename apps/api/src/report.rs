//! Assessment report PDF assembly.
//!
//! Renders a single-column report with lopdf: candidate info, quiz
//! performance, interview scores, recommendations. Text is limited to the
//! ASCII range the base-14 Type1 fonts can show; anything else is
//! replaced with '?'.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use lopdf::{dictionary, Document, Object, Stream};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::errors::AppError;
use crate::models::cv::CvRow;
use crate::models::interview::InterviewRow;
use crate::models::quiz::ResultRow;
use crate::state::AppState;

const PAGE_WIDTH: i64 = 595; // A4 portrait, points
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_TOP: f64 = 64.0;
const MARGIN_BOTTOM: f64 = 56.0;
const WRAP_COLUMNS: usize = 88;

const TITLE_SIZE: f64 = 20.0;
const HEADING_SIZE: f64 = 14.0;
const BODY_SIZE: f64 = 11.0;
const SMALL_SIZE: f64 = 9.0;

// ────────────────────────────────────────────────────────────────────────────
// Report data
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct QuizSection {
    pub score: f64,
    pub correct: i32,
    pub total: i32,
    pub feedback: String,
}

#[derive(Debug, Clone)]
pub struct InterviewSection {
    pub soft_skills_score: i32,
    pub communication_score: i32,
    pub confidence_score: i32,
    pub feedback: String,
    pub suggestions: String,
}

#[derive(Debug, Clone)]
pub struct ReportData {
    pub candidate_name: String,
    pub candidate_phone: String,
    pub candidate_city: String,
    pub job_titles: Vec<String>,
    pub quiz: Option<QuizSection>,
    pub interview: Option<InterviewSection>,
    pub generated_on: String,
}

/// One laid-out line: text at a font size.
struct Line {
    text: String,
    size: f64,
}

impl Line {
    fn new(text: impl Into<String>, size: f64) -> Self {
        Self {
            text: text.into(),
            size,
        }
    }

    fn blank() -> Self {
        Self::new("", BODY_SIZE)
    }

    fn leading(&self) -> f64 {
        self.size + 6.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handler
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportPdfRequest {
    pub cv_id: Uuid,
    pub result_id: Option<Uuid>,
    pub interview_id: Option<Uuid>,
}

/// POST /api/ai/report/pdf/
///
/// Assembles the assessment report for a CV and returns it as a PDF
/// download. Quiz and interview sections appear when the caller passes
/// the matching ids.
pub async fn handle_report_pdf(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ReportPdfRequest>,
) -> Result<Response, AppError> {
    let cv = sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE id = $1 AND user_id = $2")
        .bind(request.cv_id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {} not found", request.cv_id)))?;

    let result = match request.result_id {
        Some(result_id) => {
            sqlx::query_as::<_, ResultRow>("SELECT * FROM results WHERE id = $1 AND user_id = $2")
                .bind(result_id)
                .bind(user.id)
                .fetch_optional(&state.db)
                .await?
        }
        None => None,
    };

    let interview = match request.interview_id {
        Some(interview_id) => {
            sqlx::query_as::<_, InterviewRow>(
                "SELECT * FROM interviews WHERE id = $1 AND user_id = $2",
            )
            .bind(interview_id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
        }
        None => None,
    };

    let data = ReportData {
        candidate_name: cv
            .extracted_name
            .clone()
            .unwrap_or_else(|| "Candidate".to_string()),
        candidate_phone: cv.extracted_phone.clone().unwrap_or_default(),
        candidate_city: cv.extracted_city.clone().unwrap_or_default(),
        job_titles: cv.job_titles(),
        quiz: result.map(|r| QuizSection {
            score: r.score,
            correct: r.correct_count,
            total: r.total_count,
            feedback: r.feedback,
        }),
        interview: interview.and_then(|i| {
            i.completed_at.map(|_| InterviewSection {
                soft_skills_score: i.soft_skills_score.unwrap_or(0),
                communication_score: i.communication_score.unwrap_or(0),
                confidence_score: i.confidence_score.unwrap_or(0),
                feedback: i.feedback.clone().unwrap_or_default(),
                suggestions: i.suggestions.clone().unwrap_or_default(),
            })
        }),
        generated_on: Utc::now().format("%Y-%m-%d").to_string(),
    };

    let pdf = render_report(&data)?;

    tracing::info!(
        "Rendered assessment report for CV {} ({} bytes)",
        cv.id,
        pdf.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"vericv-assessment-report.pdf\"",
            ),
        ],
        pdf,
    )
        .into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

/// Renders the report to PDF bytes.
pub fn render_report(data: &ReportData) -> Result<Vec<u8>, AppError> {
    let lines = layout_lines(data);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids: Vec<Object> = Vec::new();

    for page_lines in paginate(&lines) {
        let mut content = String::new();
        let mut y = PAGE_HEIGHT as f64 - MARGIN_TOP;

        for line in page_lines {
            y -= line.leading();
            if line.text.is_empty() {
                continue;
            }
            content.push_str(&format!(
                "BT /F1 {} Tf 1 0 0 1 {} {:.1} Tm ({}) Tj ET\n",
                line.size,
                MARGIN_LEFT,
                y,
                escape_pdf_text(&sanitize_pdf_text(&line.text))
            ));
        }

        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    let page_count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF serialization failed: {e}")))?;

    Ok(bytes)
}

/// Flattens the report into positioned lines, section by section.
fn layout_lines(data: &ReportData) -> Vec<Line> {
    let mut lines = vec![
        Line::new("VeriCV Assessment Report", TITLE_SIZE),
        Line::new(format!("Generated on {}", data.generated_on), SMALL_SIZE),
        Line::blank(),
        Line::new("Candidate", HEADING_SIZE),
        Line::new(format!("Name: {}", data.candidate_name), BODY_SIZE),
    ];

    if !data.candidate_phone.is_empty() {
        lines.push(Line::new(
            format!("Phone: {}", data.candidate_phone),
            BODY_SIZE,
        ));
    }
    if !data.candidate_city.is_empty() {
        lines.push(Line::new(
            format!("City: {}", data.candidate_city),
            BODY_SIZE,
        ));
    }
    if !data.job_titles.is_empty() {
        lines.push(Line::new(
            format!("Recommended roles: {}", data.job_titles.join(", ")),
            BODY_SIZE,
        ));
    }

    if let Some(quiz) = &data.quiz {
        lines.push(Line::blank());
        lines.push(Line::new("Quiz Performance", HEADING_SIZE));
        lines.push(Line::new(
            format!(
                "Score: {:.2}% ({} of {} correct)",
                quiz.score, quiz.correct, quiz.total
            ),
            BODY_SIZE,
        ));
        if !quiz.feedback.is_empty() {
            lines.push(Line::new("Feedback:", BODY_SIZE));
            for wrapped in wrap_text(&quiz.feedback, WRAP_COLUMNS) {
                lines.push(Line::new(wrapped, BODY_SIZE));
            }
        }
    }

    if let Some(interview) = &data.interview {
        lines.push(Line::blank());
        lines.push(Line::new("Voice Interview", HEADING_SIZE));
        lines.push(Line::new(
            format!("Soft skills: {}/100", interview.soft_skills_score),
            BODY_SIZE,
        ));
        lines.push(Line::new(
            format!("Communication: {}/100", interview.communication_score),
            BODY_SIZE,
        ));
        lines.push(Line::new(
            format!("Confidence: {}/100", interview.confidence_score),
            BODY_SIZE,
        ));
        if !interview.feedback.is_empty() {
            lines.push(Line::new("Feedback:", BODY_SIZE));
            for wrapped in wrap_text(&interview.feedback, WRAP_COLUMNS) {
                lines.push(Line::new(wrapped, BODY_SIZE));
            }
        }
        if !interview.suggestions.is_empty() {
            lines.push(Line::new("Suggestions:", BODY_SIZE));
            for wrapped in wrap_text(&interview.suggestions, WRAP_COLUMNS) {
                lines.push(Line::new(wrapped, BODY_SIZE));
            }
        }
    }

    lines
}

/// Splits lines into pages by cumulative leading.
fn paginate(lines: &[Line]) -> Vec<&[Line]> {
    let usable = PAGE_HEIGHT as f64 - MARGIN_TOP - MARGIN_BOTTOM;
    let mut pages = Vec::new();
    let mut start = 0;
    let mut used = 0.0;

    for (index, line) in lines.iter().enumerate() {
        if used + line.leading() > usable && index > start {
            pages.push(&lines[start..index]);
            start = index;
            used = 0.0;
        }
        used += line.leading();
    }
    pages.push(&lines[start..]);

    pages
}

/// Greedy word wrap at a column limit. Overlong words stand alone.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }

    wrapped
}

/// Replaces characters the base-14 fonts cannot show.
fn sanitize_pdf_text(text: &str) -> String {
    text.chars()
        .map(|ch| {
            if (' '..='~').contains(&ch) {
                ch
            } else {
                '?'
            }
        })
        .collect()
}

/// Escapes PDF string-literal delimiters.
fn escape_pdf_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ReportData {
        ReportData {
            candidate_name: "Sara Ahmed".to_string(),
            candidate_phone: "+966 50 123 4567".to_string(),
            candidate_city: "Riyadh".to_string(),
            job_titles: vec!["Backend Engineer".to_string(), "SRE".to_string()],
            quiz: Some(QuizSection {
                score: 86.67,
                correct: 13,
                total: 15,
                feedback: "Strong on SQL, review async Rust.".to_string(),
            }),
            interview: Some(InterviewSection {
                soft_skills_score: 78,
                communication_score: 82,
                confidence_score: 71,
                feedback: "Clear and structured answers.".to_string(),
                suggestions: "Give more concrete examples.".to_string(),
            }),
            generated_on: "2026-08-25".to_string(),
        }
    }

    fn bytes_contain(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_render_report_produces_pdf() {
        let pdf = render_report(&sample_report()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        // Content streams are uncompressed, so the text shows up verbatim.
        assert!(bytes_contain(&pdf, "VeriCV Assessment Report"));
        assert!(bytes_contain(&pdf, "Sara Ahmed"));
        assert!(bytes_contain(&pdf, "86.67%"));
        assert!(bytes_contain(&pdf, "Soft skills: 78/100"));
    }

    #[test]
    fn test_render_report_without_optional_sections() {
        let data = ReportData {
            quiz: None,
            interview: None,
            ..sample_report()
        };
        let pdf = render_report(&data).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(!bytes_contain(&pdf, "Quiz Performance"));
        assert!(!bytes_contain(&pdf, "Voice Interview"));
    }

    #[test]
    fn test_long_feedback_spills_to_second_page() {
        let mut data = sample_report();
        data.quiz = Some(QuizSection {
            score: 40.0,
            correct: 6,
            total: 15,
            feedback: "review this topic again and again ".repeat(120),
        });
        let pdf = render_report(&data).unwrap();
        assert!(bytes_contain(&pdf, "/Count 2"));
    }

    #[test]
    fn test_wrap_text_respects_columns() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn test_wrap_text_keeps_overlong_word() {
        let wrapped = wrap_text("tiny extraordinarily-long-word end", 8);
        assert_eq!(wrapped[1], "extraordinarily-long-word");
    }

    #[test]
    fn test_sanitize_replaces_non_ascii() {
        assert_eq!(sanitize_pdf_text("score 🎉 عالي"), "score ? ????");
    }

    #[test]
    fn test_escape_pdf_delimiters() {
        assert_eq!(escape_pdf_text("a (b) c\\d"), "a \\(b\\) c\\\\d");
    }
}
