//! Quiz question generation.
//!
//! The model returns loosely-shaped JSON; `normalize_generated` turns it
//! into storable questions. Items without usable options are dropped, the
//! correct answer is resolved to an index, and difficulty is banded by
//! position: the first third of the sequence is easy, the middle third
//! medium, the rest hard.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;
use crate::llm::prompts::{build_quiz_prompt, QUIZ_PARAMS};
use crate::llm::LlmClient;

pub const DEFAULT_SKILL: &str = "general";

/// A normalized multiple-choice question ready for storage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_answer: usize,
    pub skill: String,
    pub difficulty: &'static str,
}

/// Generates quiz questions from CV text in the CV's language.
pub async fn generate_questions(
    llm: &LlmClient,
    cv_text: &str,
    language: &str,
) -> Result<Vec<GeneratedQuestion>, AppError> {
    let prompt = build_quiz_prompt(cv_text, language);

    let raw: Vec<Value> = llm
        .call_json(&prompt, QUIZ_PARAMS)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(normalize_generated(&raw))
}

/// Positional difficulty banding over the generated sequence.
pub fn difficulty_band(index: usize, total: usize) -> &'static str {
    let third = total.div_ceil(3);
    if index < third {
        "easy"
    } else if index < 2 * third {
        "medium"
    } else {
        "hard"
    }
}

/// Normalizes raw model items. Unusable items (no text or no options) are
/// dropped rather than stored half-formed.
pub fn normalize_generated(raw: &[Value]) -> Vec<GeneratedQuestion> {
    let total = raw.len();

    raw.iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let text = item
                .get("question")
                .or_else(|| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();

            let options: Vec<String> = item
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            if text.is_empty() || options.is_empty() {
                warn!("Dropping unusable generated question at index {index}");
                return None;
            }

            let skill = item
                .get("skill")
                .or_else(|| item.get("topic"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SKILL.to_string());

            Some(GeneratedQuestion {
                correct_answer: resolve_correct_index(item, &options),
                text,
                options,
                skill,
                difficulty: difficulty_band(index, total),
            })
        })
        .collect()
}

/// Resolves the correct option index: an explicit numeric index wins, then
/// a match of the answer text against the options, then index 0.
fn resolve_correct_index(item: &Value, options: &[String]) -> usize {
    let explicit = item
        .get("correctAnswer")
        .or_else(|| item.get("correct_answer"))
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    if let Some(index) = explicit {
        if index < options.len() {
            return index;
        }
    }

    item.get("answer")
        .and_then(Value::as_str)
        .and_then(|answer| options.iter().position(|o| o == answer.trim()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_difficulty_band_fifteen_questions() {
        assert_eq!(difficulty_band(0, 15), "easy");
        assert_eq!(difficulty_band(4, 15), "easy");
        assert_eq!(difficulty_band(5, 15), "medium");
        assert_eq!(difficulty_band(9, 15), "medium");
        assert_eq!(difficulty_band(10, 15), "hard");
        assert_eq!(difficulty_band(14, 15), "hard");
    }

    #[test]
    fn test_difficulty_band_uneven_count() {
        // ceil(7 / 3) = 3: indexes 0-2 easy, 3-5 medium, 6 hard.
        assert_eq!(difficulty_band(2, 7), "easy");
        assert_eq!(difficulty_band(3, 7), "medium");
        assert_eq!(difficulty_band(6, 7), "hard");
    }

    #[test]
    fn test_normalize_resolves_answer_text() {
        let raw = vec![json!({
            "question": "Which crate provides async runtime?",
            "options": ["serde", "tokio", "clap", "regex"],
            "answer": "tokio",
            "skill": "Rust"
        })];
        let questions = normalize_generated(&raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer, 1);
        assert_eq!(questions[0].skill, "Rust");
    }

    #[test]
    fn test_normalize_defaults_unmatched_answer_to_zero() {
        let raw = vec![json!({
            "question": "Q",
            "options": ["a", "b"],
            "answer": "not an option"
        })];
        assert_eq!(normalize_generated(&raw)[0].correct_answer, 0);
    }

    #[test]
    fn test_normalize_accepts_numeric_correct_answer() {
        let raw = vec![json!({
            "question": "Q",
            "options": ["a", "b", "c", "d"],
            "correctAnswer": 2
        })];
        assert_eq!(normalize_generated(&raw)[0].correct_answer, 2);
    }

    #[test]
    fn test_normalize_clamps_out_of_bounds_numeric_answer() {
        let raw = vec![json!({
            "question": "Q",
            "options": ["a", "b"],
            "correctAnswer": 9
        })];
        assert_eq!(normalize_generated(&raw)[0].correct_answer, 0);
    }

    #[test]
    fn test_normalize_defaults_skill() {
        let raw = vec![json!({
            "question": "Q",
            "options": ["a", "b"],
            "answer": "b"
        })];
        assert_eq!(normalize_generated(&raw)[0].skill, DEFAULT_SKILL);
    }

    #[test]
    fn test_normalize_reads_topic_as_skill() {
        let raw = vec![json!({
            "question": "Q",
            "options": ["a", "b"],
            "answer": "a",
            "topic": "SQL"
        })];
        assert_eq!(normalize_generated(&raw)[0].skill, "SQL");
    }

    #[test]
    fn test_normalize_drops_items_without_options() {
        let raw = vec![
            json!({ "question": "no options here" }),
            json!({ "question": "fine", "options": ["a", "b"], "answer": "a" }),
            json!({ "options": ["a", "b"] }),
        ];
        let questions = normalize_generated(&raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "fine");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize_generated(&[]).is_empty());
    }
}
