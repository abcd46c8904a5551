//! CV text and field extraction.
//!
//! The pipeline is: PDF bytes -> raw text (capped) -> language detection ->
//! LLM field extraction. Field extraction never fails the upload: when the
//! LLM call or its JSON output is unusable, a regex fallback fills in what
//! it can and the rest stays empty for the user to confirm by hand.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;
use crate::llm::prompts::{build_extraction_prompt, EXTRACTION_PARAMS};
use crate::llm::LlmClient;

/// CV text beyond this many characters is dropped before any LLM call.
pub const CV_TEXT_LIMIT: usize = 4000;

/// Arabic-script share of alphabetic characters at which a CV is treated
/// as Arabic.
const ARABIC_RATIO_THRESHOLD: f64 = 0.3;

/// How many characters of text the language sniffer looks at.
const LANGUAGE_SAMPLE_CHARS: usize = 1000;

const MAX_JOB_TITLES: usize = 3;

/// Contact fields pulled out of a CV.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CvFields {
    pub name: String,
    pub phone: String,
    pub city: String,
    pub job_titles: Vec<String>,
}

/// Extracts plain text from PDF bytes.
pub fn extract_pdf_text(data: &[u8]) -> Result<String, AppError> {
    let text = pdf_extract::extract_text_from_mem(data).map_err(|e| {
        AppError::UnprocessableEntity(format!("could not extract text from the PDF: {e}"))
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "the PDF contains no extractable text".to_string(),
        ));
    }

    Ok(truncate_cv_text(text))
}

/// Caps CV text at `CV_TEXT_LIMIT` characters (not bytes).
pub fn truncate_cv_text(text: &str) -> String {
    text.chars().take(CV_TEXT_LIMIT).collect()
}

/// Classifies CV text as "ar" or "en" by the share of Arabic script among
/// alphabetic characters in the leading sample.
pub fn detect_language(text: &str) -> &'static str {
    let mut arabic = 0usize;
    let mut alphabetic = 0usize;

    for ch in text.trim().chars().take(LANGUAGE_SAMPLE_CHARS) {
        if ch.is_alphabetic() {
            alphabetic += 1;
            if is_arabic(ch) {
                arabic += 1;
            }
        }
    }

    if alphabetic > 0 && (arabic as f64 / alphabetic as f64) >= ARABIC_RATIO_THRESHOLD {
        "ar"
    } else {
        "en"
    }
}

fn is_arabic(ch: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&ch) || ('\u{0750}'..='\u{077F}').contains(&ch)
}

/// Pulls name, phone, city and recent job titles out of CV text.
/// Falls back to regex heuristics when the LLM call fails.
pub async fn extract_fields(llm: &LlmClient, cv_text: &str) -> CvFields {
    let prompt = build_extraction_prompt(cv_text);

    match llm.call_json::<Value>(&prompt, EXTRACTION_PARAMS).await {
        Ok(parsed) => fields_from_value(&parsed),
        Err(e) => {
            warn!("LLM field extraction failed ({e}), using regex fallback");
            fallback_fields(cv_text)
        }
    }
}

/// Reads fields out of the model's JSON object, tolerating missing keys
/// and explicit nulls.
fn fields_from_value(parsed: &Value) -> CvFields {
    CvFields {
        name: string_field(parsed, "name"),
        phone: string_field(parsed, "phone"),
        city: string_field(parsed, "city"),
        job_titles: parsed
            .get("job_titles")
            .and_then(Value::as_array)
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .take(MAX_JOB_TITLES)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn string_field(parsed: &Value, key: &str) -> String {
    parsed
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Regex heuristics used when the LLM is unavailable: first phone-shaped
/// token and the first capitalized name pair at a line start. City stays
/// empty; there is no safe pattern for it.
pub fn fallback_fields(cv_text: &str) -> CvFields {
    let mut fields = CvFields::default();

    let phone_patterns = [
        r"\+\d{1,3}[-.\s]?\(?\d{1,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}",
        r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b",
    ];
    for pattern in phone_patterns {
        if let Some(m) = Regex::new(pattern).ok().and_then(|re| re.find(cv_text)) {
            fields.phone = m.as_str().trim().to_string();
            break;
        }
    }

    if let Some(name) = Regex::new(r"(?m)^\s*([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\s*$")
        .ok()
        .and_then(|re| re.captures(cv_text))
        .and_then(|caps| caps.get(1))
    {
        fields.name = name.as_str().trim().to_string();
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_language_english() {
        assert_eq!(
            detect_language("Senior software engineer with ten years of experience"),
            "en"
        );
    }

    #[test]
    fn test_detect_language_arabic() {
        assert_eq!(
            detect_language("مهندس برمجيات أول مع عشر سنوات من الخبرة"),
            "ar"
        );
    }

    #[test]
    fn test_detect_language_mostly_english_with_some_arabic() {
        // Well under the 30% Arabic-script threshold.
        let text = "Software engineer fluent in Arabic (العربية) and English, \
                    based in Riyadh with experience across several teams";
        assert_eq!(detect_language(text), "en");
    }

    #[test]
    fn test_detect_language_empty_text_defaults_to_english() {
        assert_eq!(detect_language(""), "en");
        assert_eq!(detect_language("12345 !!!"), "en");
    }

    #[test]
    fn test_truncate_cv_text_caps_characters() {
        let long = "x".repeat(CV_TEXT_LIMIT + 500);
        assert_eq!(truncate_cv_text(&long).chars().count(), CV_TEXT_LIMIT);

        let short = "short text";
        assert_eq!(truncate_cv_text(short), short);
    }

    #[test]
    fn test_truncate_cv_text_multibyte_safe() {
        let arabic = "م".repeat(CV_TEXT_LIMIT + 10);
        let truncated = truncate_cv_text(&arabic);
        assert_eq!(truncated.chars().count(), CV_TEXT_LIMIT);
    }

    #[test]
    fn test_fields_from_value_reads_all_fields() {
        let parsed = json!({
            "name": "Sara Ahmed",
            "phone": "+966 50 123 4567",
            "city": "Riyadh",
            "job_titles": ["Backend Engineer", "Software Engineer"]
        });
        let fields = fields_from_value(&parsed);
        assert_eq!(fields.name, "Sara Ahmed");
        assert_eq!(fields.phone, "+966 50 123 4567");
        assert_eq!(fields.city, "Riyadh");
        assert_eq!(fields.job_titles.len(), 2);
    }

    #[test]
    fn test_fields_from_value_tolerates_nulls_and_missing_keys() {
        let parsed = json!({ "name": null, "job_titles": "not an array" });
        let fields = fields_from_value(&parsed);
        assert_eq!(fields, CvFields::default());
    }

    #[test]
    fn test_fields_from_value_caps_job_titles() {
        let parsed = json!({ "job_titles": ["a", "b", "c", "d", "e"] });
        assert_eq!(fields_from_value(&parsed).job_titles.len(), MAX_JOB_TITLES);
    }

    #[test]
    fn test_fallback_finds_international_phone() {
        let cv = "Contact: +1 (555) 123-4567\nexperienced developer";
        assert_eq!(fallback_fields(cv).phone, "+1 (555) 123-4567");
    }

    #[test]
    fn test_fallback_finds_plain_phone() {
        let cv = "reach me at 555-123-4567 anytime";
        assert_eq!(fallback_fields(cv).phone, "555-123-4567");
    }

    #[test]
    fn test_fallback_finds_name_at_line_start() {
        let cv = "John Smith\nSenior Developer\njohn@example.com";
        assert_eq!(fallback_fields(cv).name, "John Smith");
    }

    #[test]
    fn test_fallback_empty_when_nothing_matches() {
        let fields = fallback_fields("no contact details here");
        assert_eq!(fields, CvFields::default());
    }
}
