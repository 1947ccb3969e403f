//! Output checks shared by the background and on-demand generation paths.

use std::sync::LazyLock;

use regex::Regex;
use studyaid_shared::Question;

/// Phrases that mark a question as being about the document rather than its content.
const GENERIC_QUESTION_PHRASES: &[&str] = &[
    "type of document",
    "study material",
    "educational purposes",
    "best way to",
    "primary purpose",
    "main topic",
    "document is",
    "material contains",
    "content is",
    "information is",
    "text is",
    "suitable for",
    "designed for",
    "would be best",
    "most likely",
    "general information",
    "basic information",
];

/// Phrases that mark multiple-choice options as filler.
const GENERIC_OPTION_PHRASES: &[&str] = &[
    "educational content",
    "study notes",
    "technical manual",
    "learning and education",
    "for studying",
    "general information",
    "research material",
    "technical documentation",
];

// ---------------------------------------------------------------------------
// Raw model output
// ---------------------------------------------------------------------------

/// Strip Markdown code fences and any prose around a JSON payload.
pub fn extract_json(raw: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"));

    let body = match FENCE_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => raw,
    };
    let body = body.trim();

    // Keep the outermost array or object.
    let start = body.find(['[', '{']);
    let end = body.rfind([']', '}']);
    match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => body,
    }
}

/// Parse a quiz payload, dropping items that fail the question schema.
///
/// Returns `None` when the payload is not a JSON array at all.
pub fn parse_quiz(raw: &str) -> Option<Vec<Question>> {
    let items: Vec<serde_json::Value> = serde_json::from_str(extract_json(raw)).ok()?;
    let total = items.len();

    let questions: Vec<Question> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<Question>(item) {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::debug!(index = i, error = %e, "dropping malformed question");
                None
            }
        })
        .collect();

    tracing::debug!(total, parsed = questions.len(), "quiz payload parsed");
    Some(questions)
}

/// Parse a concept list payload. Accepts strings and `{"concept": ..}` objects.
pub fn parse_concepts(raw: &str) -> Option<Vec<String>> {
    let items: Vec<serde_json::Value> = serde_json::from_str(extract_json(raw)).ok()?;
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Object(map) => ["concept", "name", "term"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(|v| v.as_str()).map(str::to_string)),
                _ => None,
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Acceptance rules
// ---------------------------------------------------------------------------

/// A summary is usable when it has text after trimming.
pub fn accept_summary(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether a question asks about the document instead of its content.
pub fn is_generic(question: &Question) -> bool {
    let text = question.question().to_lowercase();
    if GENERIC_QUESTION_PHRASES.iter().any(|p| text.contains(p)) {
        return true;
    }
    if let Question::MultipleChoice(mc) = question {
        let options = mc.options.join(" ").to_lowercase();
        return GENERIC_OPTION_PHRASES.iter().any(|p| options.contains(p));
    }
    false
}

/// Fewest surviving questions that make a quiz acceptable.
pub fn min_accepted(requested: usize) -> usize {
    requested.div_ceil(2).max(1)
}

/// Drop generic questions and accept the rest if at least half of `requested` survive.
pub fn accept_quiz(questions: Vec<Question>, requested: usize) -> Option<Vec<Question>> {
    let offered = questions.len();
    let kept: Vec<Question> = questions.into_iter().filter(|q| !is_generic(q)).collect();

    if kept.len() >= min_accepted(requested) {
        Some(kept)
    } else {
        tracing::debug!(
            offered,
            kept = kept.len(),
            required = min_accepted(requested),
            "quiz rejected"
        );
        None
    }
}

/// Trim concepts, drop blanks, and cap the list at `max_count`.
pub fn normalize_concepts(concepts: Vec<String>, max_count: usize) -> Vec<String> {
    concepts
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .take(max_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyaid_shared::Difficulty;

    fn tf(text: &str) -> Question {
        Question::true_false(text, true, "", Difficulty::Easy, None).expect("valid")
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "Here is your quiz:\n```json\n[{\"a\": 1}]\n```\nGood luck!";
        assert_eq!(extract_json(raw), "[{\"a\": 1}]");
    }

    #[test]
    fn extracts_unfenced_array_from_prose() {
        let raw = "Sure! [\"Osmosis\", \"Diffusion\"] hope that helps";
        assert_eq!(extract_json(raw), "[\"Osmosis\", \"Diffusion\"]");
    }

    #[test]
    fn quiz_parse_keeps_valid_items_only() {
        let raw = r#"```json
[
  {"type": "multiple_choice", "question": "Which organelle performs photosynthesis?",
   "options": ["Chloroplast", "Nucleus", "Ribosome", "Vacuole"],
   "correct_answer": "Chloroplast", "explanation": "Chloroplasts hold chlorophyll."},
  {"type": "multiple_choice", "question": "Broken item", "options": ["A", "B"],
   "correct_answer": "A", "explanation": ""},
  {"type": "poem", "question": "?"},
  "not an object"
]
```"#;
        let quiz = parse_quiz(raw).expect("array");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].kind(), "multiple_choice");
    }

    #[test]
    fn quiz_parse_rejects_non_array() {
        assert!(parse_quiz("I cannot help with that.").is_none());
        assert!(parse_quiz(r#"{"questions": []}"#).is_none());
    }

    #[test]
    fn generic_questions_are_detected() {
        assert!(is_generic(&tf("What is the main topic of this text?")));
        assert!(!is_generic(&tf("Mitochondria produce ATP.")));

        let mc = Question::multiple_choice(
            "Which describes the source?",
            vec![
                "Study notes".into(),
                "A novel".into(),
                "A poem".into(),
                "A letter".into(),
            ],
            "A novel",
            "",
            Difficulty::Easy,
            None,
        )
        .expect("valid");
        assert!(is_generic(&mc));
    }

    #[test]
    fn quiz_accepted_at_half_rounded_up() {
        let three_valid_one_generic = vec![
            tf("Mitochondria produce ATP."),
            tf("Ribosomes synthesize proteins."),
            tf("The nucleus stores DNA."),
            tf("This document is about biology."),
        ];
        let accepted = accept_quiz(three_valid_one_generic, 4).expect("accepted");
        assert_eq!(accepted.len(), 3);

        // 5 requested needs 3 survivors.
        let two = vec![tf("Cells divide by mitosis."), tf("DNA is double-stranded.")];
        assert!(accept_quiz(two, 5).is_none());
        assert_eq!(min_accepted(5), 3);
        assert_eq!(min_accepted(4), 2);
        assert!(accept_quiz(vec![], 0).is_none());
    }

    #[test]
    fn concepts_are_trimmed_and_capped() {
        let raw = vec![" X ".into(), "".into(), "  ".into(), "Y".into(), "Z".into()];
        assert_eq!(normalize_concepts(raw, 2), vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn concepts_parse_accepts_objects() {
        let raw = r#"[{"concept": "Osmosis", "definition": "..."}, "Diffusion", 42, null]"#;
        assert_eq!(
            parse_concepts(raw).expect("array"),
            vec!["Osmosis".to_string(), "Diffusion".into(), "42".into()]
        );
    }

    #[test]
    fn blank_summary_is_rejected() {
        assert!(accept_summary(" \n ").is_none());
        assert_eq!(accept_summary("  Plants make food. ").as_deref(), Some("Plants make food."));
    }
}
