//! Per-skill aggregation over scored answers.
//!
//! Groups the server's answer records by skill, computes a rounded
//! percentage per group, and splits skills into strengths (80 and up)
//! and improvement areas (below 70). Skills between the thresholds are
//! listed but flagged as neither.

use serde::Deserialize;

pub const STRENGTH_THRESHOLD: u32 = 80;
pub const IMPROVEMENT_THRESHOLD: u32 = 70;

const DEFAULT_SKILL: &str = "General";

/// One scored answer as the results endpoint reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRecord {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default, alias = "isCorrect")]
    pub is_correct: bool,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillScore {
    pub skill: String,
    pub correct: usize,
    pub total: usize,
    /// Rounded percentage, half away from zero.
    pub score: u32,
}

#[derive(Debug, Default, PartialEq)]
pub struct SkillSummary {
    pub skills: Vec<SkillScore>,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
}

/// Groups answers by skill in first-seen order and classifies each
/// group against the thresholds.
pub fn aggregate_skills(records: &[AnswerRecord]) -> SkillSummary {
    let mut skills: Vec<SkillScore> = Vec::new();

    for record in records {
        let name = skill_of(record);
        let entry = match skills.iter_mut().find(|s| s.skill == name) {
            Some(entry) => entry,
            None => {
                skills.push(SkillScore {
                    skill: name,
                    correct: 0,
                    total: 0,
                    score: 0,
                });
                // Just pushed, so last exists.
                skills.last_mut().unwrap()
            }
        };
        entry.total += 1;
        if record.is_correct {
            entry.correct += 1;
        }
    }

    for entry in &mut skills {
        entry.score = percentage(entry.correct, entry.total);
    }

    let strengths = skills
        .iter()
        .filter(|s| s.score >= STRENGTH_THRESHOLD)
        .map(|s| s.skill.clone())
        .collect();
    let improvement_areas = skills
        .iter()
        .filter(|s| s.score < IMPROVEMENT_THRESHOLD)
        .map(|s| s.skill.clone())
        .collect();

    SkillSummary {
        skills,
        strengths,
        improvement_areas,
    }
}

fn skill_of(record: &AnswerRecord) -> String {
    record
        .skill
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            record
                .category
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(DEFAULT_SKILL)
        .to_string()
}

fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(skill: Option<&str>, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            question: String::new(),
            skill: skill.map(str::to_string),
            is_correct,
            category: None,
        }
    }

    #[test]
    fn test_groups_preserve_first_seen_order() {
        let records = vec![
            record(Some("sql"), true),
            record(Some("rust"), true),
            record(Some("sql"), false),
        ];
        let summary = aggregate_skills(&records);

        assert_eq!(summary.skills.len(), 2);
        assert_eq!(summary.skills[0].skill, "sql");
        assert_eq!(summary.skills[0].correct, 1);
        assert_eq!(summary.skills[0].total, 2);
        assert_eq!(summary.skills[1].skill, "rust");
    }

    #[test]
    fn test_half_right_skill_is_an_improvement_area() {
        let records = vec![record(Some("SQL"), true), record(Some("SQL"), false)];
        let summary = aggregate_skills(&records);

        assert_eq!(summary.skills[0].score, 50);
        assert!(summary.improvement_areas.contains(&"SQL".to_string()));
        assert!(!summary.strengths.contains(&"SQL".to_string()));
    }

    #[test]
    fn test_threshold_edges() {
        // 4 of 5 is exactly 80: a strength.
        let records: Vec<_> = (0..5).map(|i| record(Some("a"), i != 0)).collect();
        let summary = aggregate_skills(&records);
        assert_eq!(summary.skills[0].score, 80);
        assert!(summary.strengths.contains(&"a".to_string()));

        // 7 of 10 is exactly 70: neither bucket.
        let records: Vec<_> = (0..10).map(|i| record(Some("b"), i < 7)).collect();
        let summary = aggregate_skills(&records);
        assert_eq!(summary.skills[0].score, 70);
        assert!(summary.strengths.is_empty());
        assert!(summary.improvement_areas.is_empty());
    }

    #[test]
    fn test_missing_skill_falls_back_to_general_then_category() {
        let mut no_skill = record(None, true);
        no_skill.category = Some("backend".to_string());
        let blank_skill = record(Some("   "), false);

        let summary = aggregate_skills(&[no_skill, blank_skill]);
        assert_eq!(summary.skills[0].skill, "backend");
        assert_eq!(summary.skills[1].skill, "General");
    }

    #[test]
    fn test_deserializes_camel_case_correctness_flag() {
        let records: Vec<AnswerRecord> = serde_json::from_str(
            r#"[{"question":"q","skill":"sql","isCorrect":true},
                {"question":"q2","skill":"sql","is_correct":false}]"#,
        )
        .unwrap();

        assert!(records[0].is_correct);
        assert!(!records[1].is_correct);
        let summary = aggregate_skills(&records);
        assert_eq!(summary.skills[0].score, 50);
    }

    #[test]
    fn test_empty_input_is_empty_summary() {
        assert_eq!(aggregate_skills(&[]), SkillSummary::default());
    }
}
