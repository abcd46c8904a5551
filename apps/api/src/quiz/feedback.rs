//! Post-quiz coaching feedback.
//!
//! A perfect submission gets a fixed congratulatory message and makes no
//! LLM call at all. Anything else asks the LLM for coaching; if that
//! fails, a static fallback keeps the submission flow alive.

use tracing::warn;

use crate::llm::prompts::{build_feedback_prompt, FEEDBACK_PARAMS};
use crate::llm::LlmClient;
use crate::quiz::scoring::ScoredSubmission;

pub const CONGRATULATORY_FEEDBACK: &str =
    "Excellent work! You answered all questions correctly. 🎉";

pub const FEEDBACK_FALLBACK: &str = "Great effort! Review the questions you missed and try to \
     understand the correct answers to improve your skills.";

/// Produces feedback text for a scored submission. Never fails: LLM
/// errors degrade to `FEEDBACK_FALLBACK`.
pub async fn feedback_for(llm: &LlmClient, scored: &ScoredSubmission) -> String {
    let missed_summary = build_missed_summary(scored);

    if missed_summary.is_empty() {
        return CONGRATULATORY_FEEDBACK.to_string();
    }

    let prompt = build_feedback_prompt(
        scored.score,
        scored.correct_count,
        scored.total_count,
        &missed_summary,
    );

    match llm.call(&prompt, FEEDBACK_PARAMS).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("Feedback generation failed ({e}), using static fallback");
            FEEDBACK_FALLBACK.to_string()
        }
    }
}

/// Lists the missed questions for the coaching prompt. Empty when the
/// submission was perfect.
pub fn build_missed_summary(scored: &ScoredSubmission) -> String {
    scored
        .answers
        .iter()
        .filter(|a| !a.is_correct)
        .map(|a| {
            format!(
                "- \"{}\" (skill: {}): answered option {}, correct option {}",
                a.question,
                a.skill,
                a.selected
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                a.correct
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::scoring::ScoredAnswer;

    fn scored(answers: Vec<ScoredAnswer>) -> ScoredSubmission {
        let correct_count = answers.iter().filter(|a| a.is_correct).count();
        let total_count = answers.len();
        ScoredSubmission {
            answers,
            correct_count,
            total_count,
            score: 100.0 * correct_count as f64 / total_count.max(1) as f64,
        }
    }

    fn correct(question: &str) -> ScoredAnswer {
        ScoredAnswer {
            question: question.to_string(),
            selected: Some(0),
            correct: 0,
            is_correct: true,
            skill: "general".to_string(),
        }
    }

    fn wrong(question: &str) -> ScoredAnswer {
        ScoredAnswer {
            question: question.to_string(),
            selected: Some(1),
            correct: 0,
            is_correct: false,
            skill: "general".to_string(),
        }
    }

    #[tokio::test]
    async fn test_perfect_submission_gets_fixed_congratulations() {
        // No request is made on this path, so a dummy client is safe.
        let llm = LlmClient::new("unused-key".to_string());
        let submission = scored(vec![correct("Q1"), correct("Q2")]);

        let feedback = feedback_for(&llm, &submission).await;
        assert_eq!(feedback, CONGRATULATORY_FEEDBACK);
    }

    #[test]
    fn test_missed_summary_empty_for_perfect_submission() {
        let submission = scored(vec![correct("Q1")]);
        assert!(build_missed_summary(&submission).is_empty());
    }

    #[test]
    fn test_missed_summary_lists_only_wrong_answers() {
        let submission = scored(vec![correct("Q1"), wrong("Q2"), wrong("Q3")]);
        let summary = build_missed_summary(&submission);
        assert!(!summary.contains("Q1"));
        assert!(summary.contains("Q2"));
        assert!(summary.contains("Q3"));
    }

    #[test]
    fn test_missed_summary_shows_unanswered_as_none() {
        let mut missed = wrong("Q1");
        missed.selected = None;
        let summary = build_missed_summary(&scored(vec![missed]));
        assert!(summary.contains("answered option none"));
    }
}
