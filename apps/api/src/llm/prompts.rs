// Prompt templates and sampling parameters for every LLM call in VeriCV.
// Templates use {placeholder} markers filled via `str::replace` by the
// builders below. Each call site owns its temperature and token budget:
// extraction runs cold, question generation runs hot.

use super::CallParams;

// ────────────────────────────────────────────
// CV field extraction
// ────────────────────────────────────────────

pub const EXTRACTION_PARAMS: CallParams = CallParams {
    temperature: 0.3,
    max_tokens: 500,
};

pub const EXTRACTION_PROMPT_TEMPLATE: &str = "\
Extract the following information from this CV/Resume text:
1. Full name of the person
2. Phone number
3. City or location
4. Job titles or positions held (current or most recent 3 positions)

Return ONLY a JSON object with this exact structure, no other text:
{\"name\": \"extracted name\", \"phone\": \"extracted phone\", \"city\": \"extracted city\", \"job_titles\": [\"title1\", \"title2\", \"title3\"]}

If a field cannot be found, use an empty string (or empty array for job_titles).

CV Text:
{cv_text}";

pub fn build_extraction_prompt(cv_text: &str) -> String {
    EXTRACTION_PROMPT_TEMPLATE.replace("{cv_text}", cv_text)
}

// ────────────────────────────────────────────
// Quiz generation
// ────────────────────────────────────────────

pub const QUIZ_PARAMS: CallParams = CallParams {
    temperature: 0.8,
    max_tokens: 3500,
};

pub const QUIZ_QUESTION_COUNT: usize = 15;

const QUIZ_LANGUAGE_INSTRUCTION_AR: &str = "\
IMPORTANT: Generate ALL questions, options and skill names in Arabic (اللغة العربية).";

const QUIZ_LANGUAGE_INSTRUCTION_EN: &str = "Generate all questions and options in English.";

pub const QUIZ_PROMPT_TEMPLATE: &str = "\
You are a quiz generator. Based on the following CV/Resume text, generate exactly {count} \
multiple-choice questions that test the candidate's knowledge of the skills, technologies \
and experience mentioned in the CV. Each question must have exactly 4 options and exactly \
one correct answer. Label each question with the single skill it tests.
{language_instruction}

Return ONLY a JSON array with this exact structure, no other text:
[{\"question\": \"the question text\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"answer\": \"the correct option text\", \"skill\": \"the skill tested\"}]

CV Text:
{cv_text}";

pub fn build_quiz_prompt(cv_text: &str, language: &str) -> String {
    let language_instruction = if language == "ar" {
        QUIZ_LANGUAGE_INSTRUCTION_AR
    } else {
        QUIZ_LANGUAGE_INSTRUCTION_EN
    };

    QUIZ_PROMPT_TEMPLATE
        .replace("{count}", &QUIZ_QUESTION_COUNT.to_string())
        .replace("{language_instruction}", language_instruction)
        .replace("{cv_text}", cv_text)
}

// ────────────────────────────────────────────
// Post-quiz feedback
// ────────────────────────────────────────────

pub const FEEDBACK_PARAMS: CallParams = CallParams {
    temperature: 0.7,
    max_tokens: 1000,
};

pub const FEEDBACK_PROMPT_TEMPLATE: &str = "\
You are a friendly quiz coach. A candidate just completed a skill assessment quiz and \
scored {score}% ({correct} of {total} correct). Here are the questions they got wrong:

{missed_summary}

For each missed question, briefly explain why the correct answer is right. Be encouraging \
and constructive. Keep the whole response under 200 words and address the candidate \
directly. Return plain text, no JSON.";

pub fn build_feedback_prompt(
    score: f64,
    correct: usize,
    total: usize,
    missed_summary: &str,
) -> String {
    FEEDBACK_PROMPT_TEMPLATE
        .replace("{score}", &format!("{score:.1}"))
        .replace("{correct}", &correct.to_string())
        .replace("{total}", &total.to_string())
        .replace("{missed_summary}", missed_summary)
}

// ────────────────────────────────────────────
// Voice interview
// ────────────────────────────────────────────

pub const INTERVIEW_QUESTIONS_PARAMS: CallParams = CallParams {
    temperature: 0.7,
    max_tokens: 1000,
};

pub const INTERVIEW_QUESTION_COUNT: usize = 5;

const INTERVIEW_LANGUAGE_INSTRUCTION_AR: &str =
    "IMPORTANT: Generate all questions in Arabic (اللغة العربية).";

const INTERVIEW_LANGUAGE_INSTRUCTION_EN: &str = "Generate all questions in English.";

pub const INTERVIEW_QUESTIONS_PROMPT_TEMPLATE: &str = "\
Based on this CV, generate exactly {count} short spoken-interview questions that assess \
the candidate's soft skills, communication and confidence. The questions should be open \
ended and answerable in under a minute each.
{language_instruction}

Return ONLY a JSON array of {count} strings, no other text:
[\"question 1\", \"question 2\", \"question 3\", \"question 4\", \"question 5\"]

CV Text:
{cv_text}";

pub fn build_interview_questions_prompt(cv_text: &str, language: &str) -> String {
    let language_instruction = if language == "ar" {
        INTERVIEW_LANGUAGE_INSTRUCTION_AR
    } else {
        INTERVIEW_LANGUAGE_INSTRUCTION_EN
    };

    INTERVIEW_QUESTIONS_PROMPT_TEMPLATE
        .replace("{count}", &INTERVIEW_QUESTION_COUNT.to_string())
        .replace("{language_instruction}", language_instruction)
        .replace("{cv_text}", cv_text)
}

pub const INTERVIEW_EVAL_PARAMS: CallParams = CallParams {
    temperature: 0.5,
    max_tokens: 1500,
};

pub const INTERVIEW_EVAL_PROMPT_TEMPLATE: &str = "\
You are an interview evaluator. A candidate answered the following spoken interview \
questions. Evaluate their soft skills, communication and confidence from the transcription.

Questions asked:
{questions}

Candidate's transcribed answers:
{transcription}

Return ONLY a JSON object with this exact structure, no other text:
{\"soft_skills_score\": 0, \"communication_score\": 0, \"confidence_score\": 0, \"feedback\": \"2-3 sentences on how they did\", \"suggestions\": \"2-3 sentences on how to improve\"}

All scores are integers from 0 to 100.";

pub fn build_interview_eval_prompt(questions: &[String], transcription: &str) -> String {
    let joined = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");

    INTERVIEW_EVAL_PROMPT_TEMPLATE
        .replace("{questions}", &joined)
        .replace("{transcription}", transcription)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_quiz_prompt_substitutes_placeholders() {
        let prompt = build_quiz_prompt("Rust developer, 5 years", "en");
        assert!(prompt.contains("exactly 15 multiple-choice questions"));
        assert!(prompt.contains("Rust developer, 5 years"));
        assert!(!prompt.contains("{cv_text}"));
        assert!(!prompt.contains("{language_instruction}"));
    }

    #[test]
    fn test_build_quiz_prompt_arabic_instruction() {
        let prompt = build_quiz_prompt("مهندس برمجيات", "ar");
        assert!(prompt.contains("Arabic"));
    }

    #[test]
    fn test_build_interview_eval_prompt_numbers_questions() {
        let questions = vec!["Tell me about yourself.".to_string(), "Why us?".to_string()];
        let prompt = build_interview_eval_prompt(&questions, "I am a developer.");
        assert!(prompt.contains("1. Tell me about yourself."));
        assert!(prompt.contains("2. Why us?"));
        assert!(prompt.contains("I am a developer."));
    }
}
