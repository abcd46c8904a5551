//! Deterministic quiz scoring.
//!
//! Submitted answers are paired positionally with the quiz's stored
//! questions in `question_number` order. Pairs beyond the stored question
//! count are discarded before scoring, so the reported total always equals
//! the number of scored pairs. No LLM involvement anywhere in this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::quiz::QuestionRow;

/// One submitted answer. `answer` is kept loose: clients send option
/// indexes as numbers or numeric strings, and free text when a question
/// had no options.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubmittedAnswer {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: Value,
}

/// One scored pair, stored verbatim in the result row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredAnswer {
    pub question: String,
    /// The coerced selected index; `None` when the answer was not numeric.
    pub selected: Option<i64>,
    pub correct: i64,
    pub is_correct: bool,
    pub skill: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredSubmission {
    pub answers: Vec<ScoredAnswer>,
    pub correct_count: usize,
    pub total_count: usize,
    /// Percentage, rounded to two decimals.
    pub score: f64,
}

/// Accepts both submission shapes: a list of `{question, answer}` records
/// or a map of question text to answer.
pub fn normalize_answer_payload(payload: &Value) -> Vec<SubmittedAnswer> {
    match payload {
        Value::Array(items) => items
            .iter()
            .map(|item| SubmittedAnswer {
                question: item
                    .get("question")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                answer: item.get("answer").cloned().unwrap_or(Value::Null),
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(question, answer)| SubmittedAnswer {
                question: question.clone(),
                answer: answer.clone(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Coerces an answer to an option index. Numbers pass through; strings
/// are parsed after trimming. Anything else is not an index.
pub fn coerce_answer_index(answer: &Value) -> Option<i64> {
    match answer {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores a submission against stored questions (in `question_number`
/// order). An answer is correct iff its coerced index equals the stored
/// correct index.
pub fn score_submission(
    questions: &[QuestionRow],
    submitted: &[SubmittedAnswer],
) -> ScoredSubmission {
    let answers: Vec<ScoredAnswer> = submitted
        .iter()
        .take(questions.len())
        .enumerate()
        .map(|(index, sub)| {
            let question = &questions[index];
            let selected = coerce_answer_index(&sub.answer);
            let correct = i64::from(question.correct_answer);

            ScoredAnswer {
                question: if sub.question.trim().is_empty() {
                    question.text.clone()
                } else {
                    sub.question.clone()
                },
                selected,
                correct,
                is_correct: selected == Some(correct),
                skill: question.skill_tag.clone(),
            }
        })
        .collect();

    let correct_count = answers.iter().filter(|a| a.is_correct).count();
    let total_count = answers.len();
    let score = if total_count > 0 {
        round2(100.0 * correct_count as f64 / total_count as f64)
    } else {
        0.0
    };

    ScoredSubmission {
        answers,
        correct_count,
        total_count,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn question(number: i32, correct: i32, skill: &str) -> QuestionRow {
        QuestionRow {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            question_number: number,
            text: format!("Question {number}"),
            options: json!(["a", "b", "c", "d"]),
            correct_answer: correct,
            skill_tag: skill.to_string(),
            difficulty: "easy".to_string(),
        }
    }

    fn answer(value: Value) -> SubmittedAnswer {
        SubmittedAnswer {
            question: String::new(),
            answer: value,
        }
    }

    #[test]
    fn test_all_correct_scores_one_hundred() {
        let questions = vec![question(1, 0, "sql"), question(2, 1, "rust")];
        let submitted = vec![answer(json!(0)), answer(json!(1))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.score, 100.0);
        assert_eq!(scored.correct_count, 2);
        assert_eq!(scored.total_count, 2);
    }

    #[test]
    fn test_half_correct_scores_fifty() {
        let questions = vec![question(1, 0, "sql"), question(2, 1, "rust")];
        let submitted = vec![answer(json!(0)), answer(json!(0))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.score, 50.0);
        assert_eq!(scored.correct_count, 1);
    }

    #[test]
    fn test_score_rounds_to_two_decimals() {
        let questions = vec![
            question(1, 0, "a"),
            question(2, 0, "b"),
            question(3, 0, "c"),
        ];
        let submitted = vec![answer(json!(0)), answer(json!(1)), answer(json!(1))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.score, 33.33);
    }

    #[test]
    fn test_numeric_string_answers_are_coerced() {
        let questions = vec![question(1, 2, "sql")];
        let submitted = vec![answer(json!("2"))];

        let scored = score_submission(&questions, &submitted);
        assert!(scored.answers[0].is_correct);
        assert_eq!(scored.answers[0].selected, Some(2));
    }

    #[test]
    fn test_free_text_answers_are_incorrect() {
        let questions = vec![question(1, 0, "sql")];
        let submitted = vec![answer(json!("my own words"))];

        let scored = score_submission(&questions, &submitted);
        assert!(!scored.answers[0].is_correct);
        assert_eq!(scored.answers[0].selected, None);
    }

    #[test]
    fn test_submissions_beyond_stored_questions_are_dropped() {
        let questions = vec![question(1, 0, "sql"), question(2, 0, "rust")];
        let submitted = vec![answer(json!(0)), answer(json!(0)), answer(json!(0))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.total_count, 2);
        assert_eq!(scored.answers.len(), 2);
        assert_eq!(scored.score, 100.0);
    }

    #[test]
    fn test_short_submission_scores_what_was_sent() {
        let questions = vec![question(1, 0, "sql"), question(2, 0, "rust")];
        let submitted = vec![answer(json!(0))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.total_count, 1);
        assert_eq!(scored.score, 100.0);
    }

    #[test]
    fn test_empty_submission_scores_zero() {
        let questions = vec![question(1, 0, "sql")];
        let scored = score_submission(&questions, &[]);
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.total_count, 0);
    }

    #[test]
    fn test_scored_answer_keeps_stored_question_text() {
        let questions = vec![question(1, 0, "sql")];
        let submitted = vec![answer(json!(0))];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.answers[0].question, "Question 1");
        assert_eq!(scored.answers[0].skill, "sql");
    }

    #[test]
    fn test_submitted_question_text_wins_when_present() {
        let questions = vec![question(1, 0, "sql")];
        let submitted = vec![SubmittedAnswer {
            question: "What is a JOIN?".to_string(),
            answer: json!(0),
        }];

        let scored = score_submission(&questions, &submitted);
        assert_eq!(scored.answers[0].question, "What is a JOIN?");
    }

    #[test]
    fn test_normalize_answer_payload_list() {
        let payload = json!([
            { "question": "Q1", "answer": 0 },
            { "answer": "2" },
        ]);
        let normalized = normalize_answer_payload(&payload);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].question, "Q1");
        assert_eq!(normalized[1].question, "");
        assert_eq!(normalized[1].answer, json!("2"));
    }

    #[test]
    fn test_normalize_answer_payload_map_keeps_order() {
        let payload = json!({ "Q1": 0, "Q2": 1, "Q3": 2 });
        let normalized = normalize_answer_payload(&payload);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].question, "Q1");
        assert_eq!(normalized[2].question, "Q3");
    }

    #[test]
    fn test_normalize_answer_payload_rejects_scalars() {
        assert!(normalize_answer_payload(&json!("nope")).is_empty());
    }

    #[test]
    fn test_coerce_answer_index_variants() {
        assert_eq!(coerce_answer_index(&json!(3)), Some(3));
        assert_eq!(coerce_answer_index(&json!(" 1 ")), Some(1));
        assert_eq!(coerce_answer_index(&json!("abc")), None);
        assert_eq!(coerce_answer_index(&json!(null)), None);
        assert_eq!(coerce_answer_index(&json!([1])), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.66666), 66.67);
        assert_eq!(round2(33.33333), 33.33);
        assert_eq!(round2(100.0), 100.0);
    }
}
