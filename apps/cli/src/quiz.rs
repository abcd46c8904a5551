//! Client-side quiz state: question normalization and the interactive
//! session machine driving the terminal quiz.
//!
//! Servers and LLM passthroughs disagree on payload shape, so
//! `normalize_questions` accepts a bare array, `{"questions": [...]}`,
//! or `{"data": [...]}`, and tolerates items that are plain strings or
//! objects with renamed keys. Anything it cannot read becomes a
//! text-only question rather than an error.

use serde_json::{json, Value};

/// Ten minutes on the quiz clock.
pub const QUIZ_DURATION_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    #[allow(dead_code)]
    pub id: String,
    pub text: String,
    pub options: Option<Vec<String>>,
    /// Captured when upstream leaks it; the server never sends it.
    #[allow(dead_code)]
    pub correct_answer: Option<usize>,
    pub skill: Option<String>,
    pub category: Option<String>,
}

impl Question {
    /// Label shown next to the prompt: skill tag, else category.
    pub fn skill_label(&self) -> Option<&str> {
        self.skill.as_deref().or(self.category.as_deref())
    }
}

// ────────────────────────────────────────────
// Normalization
// ────────────────────────────────────────────

/// Extracts a question list from whatever shape the server returned.
pub fn normalize_questions(payload: &Value) -> Vec<Question> {
    let items = if let Some(array) = payload.as_array() {
        array
    } else if let Some(array) = payload.get("questions").and_then(Value::as_array) {
        array
    } else if let Some(array) = payload.get("data").and_then(Value::as_array) {
        array
    } else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_question(index, item))
        .collect()
}

fn normalize_question(index: usize, item: &Value) -> Question {
    Question {
        id: question_id(index, item),
        text: question_text(item),
        options: question_options(item),
        correct_answer: item
            .get("correctAnswer")
            .or_else(|| item.get("correct_answer"))
            .and_then(Value::as_u64)
            .map(|n| n as usize),
        skill: string_field(item, "skill").or_else(|| string_field(item, "topic")),
        category: string_field(item, "category"),
    }
}

fn question_id(index: usize, item: &Value) -> String {
    match item.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => (index + 1).to_string(),
    }
}

fn question_text(item: &Value) -> String {
    for key in ["question", "prompt", "text"] {
        if let Some(text) = string_field(item, key) {
            return text;
        }
    }
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn question_options(item: &Value) -> Option<Vec<String>> {
    let array = item.get("options")?.as_array()?;
    let options: Vec<String> = array
        .iter()
        .map(|option| match option {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ────────────────────────────────────────────
// Session
// ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum QuizPhase {
    Generating,
    Ready,
    Submitting,
    Completed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Choice(usize),
    Text(String),
}

/// One quiz run: questions, the user's answers, cursor, and clock.
///
/// Navigation is sequential and forward motion requires an answer to
/// the current question. The clock is display-only; running out shows
/// 0:00 but never submits on the user's behalf.
#[derive(Debug)]
pub struct QuizSession {
    pub questions: Vec<Question>,
    pub answers: Vec<Option<Answer>>,
    pub current: usize,
    pub remaining_secs: u64,
    pub phase: QuizPhase,
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            questions: Vec::new(),
            answers: Vec::new(),
            current: 0,
            remaining_secs: QUIZ_DURATION_SECS,
            phase: QuizPhase::Generating,
        }
    }

    /// Installs generated questions and opens the quiz.
    pub fn load_questions(&mut self, questions: Vec<Question>) -> Result<(), String> {
        if questions.is_empty() {
            let message = "No questions were generated".to_string();
            self.phase = QuizPhase::Error(message.clone());
            return Err(message);
        }

        self.answers = vec![None; questions.len()];
        self.questions = questions;
        self.current = 0;
        self.remaining_secs = QUIZ_DURATION_SECS;
        self.phase = QuizPhase::Ready;
        Ok(())
    }

    pub fn fail(&mut self, message: &str) {
        self.phase = QuizPhase::Error(message.to_string());
    }

    /// Returns from an error back to answering; answers survive.
    pub fn resume(&mut self) -> bool {
        if matches!(self.phase, QuizPhase::Error(_)) && !self.questions.is_empty() {
            self.phase = QuizPhase::Ready;
            true
        } else {
            false
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn current_answer(&self) -> Option<&Answer> {
        self.answers.get(self.current).and_then(Option::as_ref)
    }

    pub fn select_answer(&mut self, answer: Answer) -> bool {
        if self.phase != QuizPhase::Ready {
            return false;
        }
        if let Some(slot) = self.answers.get_mut(self.current) {
            *slot = Some(answer);
            true
        } else {
            false
        }
    }

    pub fn can_advance(&self) -> bool {
        self.current_answer().is_some()
    }

    pub fn next(&mut self) -> bool {
        if self.phase == QuizPhase::Ready
            && self.can_advance()
            && self.current + 1 < self.questions.len()
        {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.phase == QuizPhase::Ready && self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_last(&self) -> bool {
        !self.questions.is_empty() && self.current + 1 == self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn all_answered(&self) -> bool {
        !self.answers.is_empty() && self.answers.iter().all(Option::is_some)
    }

    /// Advances the clock; it stops at zero and nothing else happens.
    pub fn tick(&mut self, elapsed_secs: u64) {
        if self.phase == QuizPhase::Ready {
            self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs);
        }
    }

    pub fn format_remaining(&self) -> String {
        format!("{}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    /// Moves to `Submitting` and returns the answers payload. Only legal
    /// from the last question with every question answered.
    pub fn begin_submit(&mut self) -> Result<Vec<Value>, String> {
        if self.phase != QuizPhase::Ready {
            return Err("quiz is not ready to submit".to_string());
        }
        if !self.is_last() {
            return Err("answer every question before submitting".to_string());
        }
        if !self.all_answered() {
            return Err("answer every question before submitting".to_string());
        }

        let payload = self
            .questions
            .iter()
            .zip(&self.answers)
            .map(|(question, answer)| {
                let answer_value = match answer {
                    Some(Answer::Choice(index)) => json!(index),
                    Some(Answer::Text(text)) => json!(text),
                    None => Value::Null,
                };
                json!({ "question": question.text, "answer": answer_value })
            })
            .collect();

        self.phase = QuizPhase::Submitting;
        Ok(payload)
    }

    pub fn complete(&mut self) {
        self.phase = QuizPhase::Completed;
    }
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_questions() -> Vec<Question> {
        normalize_questions(&json!([
            {"id": 1, "question": "Q1", "options": ["a", "b"], "skill": "sql"},
            {"id": 2, "question": "Q2", "options": ["c", "d"], "skill": "sql"},
        ]))
    }

    #[test]
    fn test_normalize_wrapped_questions_object() {
        let payload = json!({
            "questions": [{
                "id": 1,
                "question": "What is Rust?",
                "options": ["a lang", "a game"],
                "correctAnswer": 0,
                "skill": "rust"
            }]
        });

        let questions = normalize_questions(&payload);
        assert_eq!(questions.len(), 1);
        let q = &questions[0];
        assert_eq!(q.id, "1");
        assert_eq!(q.text, "What is Rust?");
        assert_eq!(q.options.as_deref(), Some(&["a lang".to_string(), "a game".to_string()][..]));
        assert_eq!(q.correct_answer, Some(0));
        assert_eq!(q.skill.as_deref(), Some("rust"));
    }

    #[test]
    fn test_normalize_bare_string_item() {
        let questions = normalize_questions(&json!(["just a string"]));
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "just a string");
        assert_eq!(questions[0].id, "1");
        assert!(questions[0].options.is_none());
        assert!(questions[0].correct_answer.is_none());
    }

    #[test]
    fn test_normalize_data_wrapper_and_topic_alias() {
        let payload = json!({"data": [{"text": "T?", "topic": "nets"}]});
        let questions = normalize_questions(&payload);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "T?");
        assert_eq!(questions[0].skill.as_deref(), Some("nets"));
    }

    #[test]
    fn test_skill_label_falls_back_to_category() {
        let questions = normalize_questions(&json!([
            {"question": "Q1", "skill": "sql", "category": "backend"},
            {"question": "Q2", "category": "backend"},
            {"question": "Q3"},
        ]));
        assert_eq!(questions[0].skill_label(), Some("sql"));
        assert_eq!(questions[1].skill_label(), Some("backend"));
        assert_eq!(questions[2].skill_label(), None);
    }

    #[test]
    fn test_normalize_unrecognized_shape_is_empty() {
        assert!(normalize_questions(&json!({"ok": true})).is_empty());
        assert!(normalize_questions(&json!("nope")).is_empty());
    }

    #[test]
    fn test_empty_generation_errors_the_session() {
        let mut session = QuizSession::new();
        let err = session.load_questions(Vec::new()).unwrap_err();
        assert_eq!(err, "No questions were generated");
        assert!(matches!(session.phase, QuizPhase::Error(_)));
    }

    #[test]
    fn test_forward_motion_requires_an_answer() {
        let mut session = QuizSession::new();
        session.load_questions(two_questions()).unwrap();

        assert!(!session.next());
        assert!(session.select_answer(Answer::Choice(1)));
        assert!(session.next());
        assert_eq!(session.current, 1);

        // Going back is always allowed; the earlier answer is still there.
        assert!(session.prev());
        assert_eq!(session.current_answer(), Some(&Answer::Choice(1)));
    }

    #[test]
    fn test_clock_saturates_and_never_submits() {
        let mut session = QuizSession::new();
        session.load_questions(two_questions()).unwrap();

        session.tick(QUIZ_DURATION_SECS + 50);
        assert_eq!(session.remaining_secs, 0);
        assert_eq!(session.format_remaining(), "0:00");
        assert_eq!(session.phase, QuizPhase::Ready);
    }

    #[test]
    fn test_clock_only_runs_while_ready() {
        let mut session = QuizSession::new();
        session.tick(30);
        assert_eq!(session.remaining_secs, QUIZ_DURATION_SECS);
    }

    #[test]
    fn test_format_remaining() {
        let mut session = QuizSession::new();
        session.load_questions(two_questions()).unwrap();
        assert_eq!(session.format_remaining(), "10:00");
        session.tick(535);
        assert_eq!(session.format_remaining(), "1:05");
    }

    #[test]
    fn test_submit_rejected_until_all_answered_on_last() {
        let mut session = QuizSession::new();
        session.load_questions(two_questions()).unwrap();

        assert!(session.begin_submit().is_err());

        session.select_answer(Answer::Choice(0));
        session.next();
        assert!(session.begin_submit().is_err());

        session.select_answer(Answer::Text("free text".into()));
        let payload = session.begin_submit().unwrap();
        assert_eq!(session.phase, QuizPhase::Submitting);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0]["question"], "Q1");
        assert_eq!(payload[0]["answer"], 0);
        assert_eq!(payload[1]["answer"], "free text");
    }

    #[test]
    fn test_resume_after_failed_submit_keeps_answers() {
        let mut session = QuizSession::new();
        session.load_questions(two_questions()).unwrap();
        session.select_answer(Answer::Choice(0));
        session.next();
        session.select_answer(Answer::Choice(1));
        session.begin_submit().unwrap();

        session.fail("network down");
        assert!(session.resume());
        assert_eq!(session.phase, QuizPhase::Ready);
        assert_eq!(session.answered_count(), 2);

        // A second submit succeeds with the retained answers.
        assert!(session.begin_submit().is_ok());
    }
}
