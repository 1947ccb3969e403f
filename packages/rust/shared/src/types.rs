//! Core domain types for StudyAid materials and generated study aids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StudyAidError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Minimum content length (chars) for on-demand summary generation.
pub const MIN_SUMMARY_CONTENT_CHARS: usize = 10;
/// Minimum content length (chars) for on-demand quiz generation and analysis.
pub const MIN_QUIZ_CONTENT_CHARS: usize = 50;
/// Minimum content length (chars) for on-demand concept extraction.
pub const MIN_CONCEPTS_CONTENT_CHARS: usize = 20;
/// Minimum content length (chars) for text uploads.
pub const MIN_UPLOAD_TEXT_CHARS: usize = 50;

/// Inclusive bounds for requested multiple-choice count.
pub const MCQ_RANGE: std::ops::RangeInclusive<usize> = 1..=50;
/// Inclusive bounds for requested short-answer count.
pub const SHORT_ANSWER_RANGE: std::ops::RangeInclusive<usize> = 1..=20;
/// Inclusive bounds for requested key-concept count.
pub const CONCEPTS_RANGE: std::ops::RangeInclusive<usize> = 1..=50;
/// Inclusive bounds for the advisory summary length.
pub const SUMMARY_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 50..=2000;

/// Number of options every multiple-choice question carries.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an uploaded study material (UUID v7).
    MaterialId
);

uuid_id!(
    /// Identifier of a registered user (UUID v7).
    UserId
);

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account. The password hash never leaves the storage layer
/// through this type's serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Where a material's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Pdf,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = StudyAidError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            other => Err(StudyAidError::parse(format!("unknown content kind: {other}"))),
        }
    }
}

/// An uploaded document and its extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub title: String,
    pub content: String,
    pub content_type: ContentKind,
    /// Blob store URL for the original upload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a material.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub content: String,
    pub content_type: ContentKind,
    pub file_url: Option<String>,
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// Question difficulty. Unknown values read as `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    fn parse_lenient(s: Option<&str>) -> Self {
        match s.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("easy") => Self::Easy,
            Some("hard") => Self::Hard,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleChoice {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub concept: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrueFalse {
    pub question: String,
    pub correct_answer: bool,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub concept: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortAnswer {
    pub question: String,
    pub sample_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub concept: Option<String>,
}

/// A quiz question. The `type` tag decides which fields must be present;
/// every deserialized or constructed value has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireQuestion", into = "WireQuestion")]
pub enum Question {
    MultipleChoice(MultipleChoice),
    TrueFalse(TrueFalse),
    ShortAnswer(ShortAnswer),
}

impl Question {
    /// Build a validated multiple-choice question.
    pub fn multiple_choice(
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
        difficulty: Difficulty,
        concept: Option<String>,
    ) -> Result<Self, StudyAidError> {
        let q = MultipleChoice {
            question: question.into().trim().to_string(),
            options: options.into_iter().map(|o| o.trim().to_string()).collect(),
            correct_answer: correct_answer.into().trim().to_string(),
            explanation: explanation.into(),
            difficulty,
            concept,
        };
        require_text(&q.question, "question")?;
        if q.options.len() != MULTIPLE_CHOICE_OPTIONS {
            return Err(StudyAidError::validation(format!(
                "multiple_choice needs {MULTIPLE_CHOICE_OPTIONS} options, got {}",
                q.options.len()
            )));
        }
        if q.options.iter().any(|o| o.is_empty()) {
            return Err(StudyAidError::validation("multiple_choice option is empty"));
        }
        if !q
            .options
            .iter()
            .any(|o| o.eq_ignore_ascii_case(&q.correct_answer))
        {
            return Err(StudyAidError::validation(
                "multiple_choice correct_answer is not one of the options",
            ));
        }
        Ok(Self::MultipleChoice(q))
    }

    /// Build a validated true/false question.
    pub fn true_false(
        question: impl Into<String>,
        correct_answer: bool,
        explanation: impl Into<String>,
        difficulty: Difficulty,
        concept: Option<String>,
    ) -> Result<Self, StudyAidError> {
        let q = TrueFalse {
            question: question.into().trim().to_string(),
            correct_answer,
            explanation: explanation.into(),
            difficulty,
            concept,
        };
        require_text(&q.question, "question")?;
        Ok(Self::TrueFalse(q))
    }

    /// Build a validated short-answer question.
    pub fn short_answer(
        question: impl Into<String>,
        sample_answer: impl Into<String>,
        explanation: impl Into<String>,
        difficulty: Difficulty,
        concept: Option<String>,
    ) -> Result<Self, StudyAidError> {
        let q = ShortAnswer {
            question: question.into().trim().to_string(),
            sample_answer: sample_answer.into().trim().to_string(),
            explanation: explanation.into(),
            difficulty,
            concept,
        };
        require_text(&q.question, "question")?;
        require_text(&q.sample_answer, "sample_answer")?;
        Ok(Self::ShortAnswer(q))
    }

    /// The serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MultipleChoice(_) => "multiple_choice",
            Self::TrueFalse(_) => "true_false",
            Self::ShortAnswer(_) => "short_answer",
        }
    }

    pub fn question(&self) -> &str {
        match self {
            Self::MultipleChoice(q) => &q.question,
            Self::TrueFalse(q) => &q.question,
            Self::ShortAnswer(q) => &q.question,
        }
    }

    /// Answer options as presented to the learner (empty for short answers).
    pub fn options(&self) -> Vec<String> {
        match self {
            Self::MultipleChoice(q) => q.options.clone(),
            Self::TrueFalse(_) => vec!["True".into(), "False".into()],
            Self::ShortAnswer(_) => Vec::new(),
        }
    }
}

fn require_text(value: &str, field: &str) -> Result<(), StudyAidError> {
    if value.trim().is_empty() {
        return Err(StudyAidError::validation(format!("{field} is empty")));
    }
    Ok(())
}

/// Flat JSON shape shared by the database, the HTTP API, and model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireQuestion {
    question: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_answer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_answer: Option<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    concept: Option<String>,
}

fn answer_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<WireQuestion> for Question {
    type Error = StudyAidError;

    fn try_from(w: WireQuestion) -> Result<Self, Self::Error> {
        let difficulty = Difficulty::parse_lenient(w.difficulty.as_deref());
        let concept = w.concept.filter(|c| !c.trim().is_empty());
        let answer = answer_text(w.correct_answer.as_ref());

        match w.kind.trim() {
            "multiple_choice" => {
                let answer = answer
                    .ok_or_else(|| StudyAidError::validation("multiple_choice needs correct_answer"))?;
                Question::multiple_choice(
                    w.question,
                    w.options.unwrap_or_default(),
                    answer,
                    w.explanation,
                    difficulty,
                    concept,
                )
            }
            "true_false" => {
                let answer = answer
                    .ok_or_else(|| StudyAidError::validation("true_false needs correct_answer"))?;
                let value = match answer.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(StudyAidError::validation(format!(
                            "true_false correct_answer must be True or False, got {other}"
                        )));
                    }
                };
                Question::true_false(w.question, value, w.explanation, difficulty, concept)
            }
            "short_answer" => {
                // Models sometimes put the model answer in correct_answer.
                let sample = w
                    .sample_answer
                    .filter(|s| !s.trim().is_empty())
                    .or(answer)
                    .ok_or_else(|| StudyAidError::validation("short_answer needs sample_answer"))?;
                Question::short_answer(w.question, sample, w.explanation, difficulty, concept)
            }
            other => Err(StudyAidError::validation(format!(
                "unknown question type: {other}"
            ))),
        }
    }
}

impl From<Question> for WireQuestion {
    fn from(q: Question) -> Self {
        match q {
            Question::MultipleChoice(q) => WireQuestion {
                question: q.question,
                kind: "multiple_choice".into(),
                options: Some(q.options),
                correct_answer: Some(serde_json::Value::String(q.correct_answer)),
                sample_answer: None,
                explanation: q.explanation,
                difficulty: Some(difficulty_str(q.difficulty).into()),
                concept: q.concept,
            },
            Question::TrueFalse(q) => WireQuestion {
                question: q.question,
                kind: "true_false".into(),
                options: Some(vec!["True".into(), "False".into()]),
                correct_answer: Some(serde_json::Value::String(
                    if q.correct_answer { "True" } else { "False" }.into(),
                )),
                sample_answer: None,
                explanation: q.explanation,
                difficulty: Some(difficulty_str(q.difficulty).into()),
                concept: q.concept,
            },
            Question::ShortAnswer(q) => WireQuestion {
                question: q.question,
                kind: "short_answer".into(),
                options: None,
                correct_answer: None,
                sample_answer: Some(q.sample_answer),
                explanation: q.explanation,
                difficulty: Some(difficulty_str(q.difficulty).into()),
                concept: q.concept,
            },
        }
    }
}

fn difficulty_str(d: Difficulty) -> &'static str {
    match d {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    }
}

// ---------------------------------------------------------------------------
// Generated artifacts
// ---------------------------------------------------------------------------

/// The stored study aids for one material. Each field is independently nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub material_id: MaterialId,
    pub summary: Option<String>,
    pub quiz_questions: Option<Vec<Question>>,
    pub key_concepts: Option<Vec<String>>,
    pub generated_at: DateTime<Utc>,
}

/// A partial write to an [`ArtifactSet`]. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPatch {
    pub summary: Option<String>,
    pub quiz_questions: Option<Vec<Question>>,
    pub key_concepts: Option<Vec<String>>,
}

impl ArtifactPatch {
    /// Drop empty values so they never overwrite stored data.
    pub fn normalized(self) -> Self {
        Self {
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            quiz_questions: self.quiz_questions.filter(|q| !q.is_empty()),
            key_concepts: self.key_concepts.filter(|c| !c.is_empty()),
        }
    }

    /// True when no field carries a non-empty value.
    pub fn is_empty(&self) -> bool {
        self.summary.as_deref().is_none_or(|s| s.trim().is_empty())
            && self.quiz_questions.as_ref().is_none_or(|q| q.is_empty())
            && self.key_concepts.as_ref().is_none_or(|c| c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_id_roundtrip() {
        let id = MaterialId::new();
        let parsed: MaterialId = id.to_string().parse().expect("parse MaterialId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn multiple_choice_requires_four_options() {
        let err = Question::multiple_choice(
            "Which gas do plants absorb?",
            vec!["CO2".into(), "O2".into()],
            "CO2",
            "",
            Difficulty::Easy,
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn multiple_choice_answer_matches_option_case_insensitively() {
        let q = Question::multiple_choice(
            "Which gas do plants absorb?",
            vec!["CO2".into(), "O2".into(), "N2".into(), "He".into()],
            "co2",
            "Photosynthesis consumes carbon dioxide.",
            Difficulty::Medium,
            Some("Photosynthesis".into()),
        );
        assert!(q.is_ok());
    }

    #[test]
    fn deserializes_tagged_questions() {
        let json = r#"[
            {"type": "true_false", "question": "Water boils at 100C at sea level.",
             "options": ["True", "False"], "correct_answer": true, "explanation": "Standard pressure."},
            {"type": "short_answer", "question": "Define osmosis.",
             "sample_answer": "Diffusion of water across a membrane.", "explanation": "",
             "difficulty": "HARD"}
        ]"#;
        let qs: Vec<Question> = serde_json::from_str(json).expect("parse questions");
        assert_eq!(qs[0].kind(), "true_false");
        match &qs[0] {
            Question::TrueFalse(tf) => assert!(tf.correct_answer),
            other => panic!("unexpected {other:?}"),
        }
        match &qs[1] {
            Question::ShortAnswer(sa) => assert_eq!(sa.difficulty, Difficulty::Hard),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_tag_and_missing_fields() {
        let unknown = r#"{"type": "essay", "question": "Discuss.", "explanation": ""}"#;
        assert!(serde_json::from_str::<Question>(unknown).is_err());

        let no_sample = r#"{"type": "short_answer", "question": "Define osmosis.", "explanation": ""}"#;
        assert!(serde_json::from_str::<Question>(no_sample).is_err());

        let bad_tf = r#"{"type": "true_false", "question": "Q?", "correct_answer": "Maybe"}"#;
        assert!(serde_json::from_str::<Question>(bad_tf).is_err());
    }

    #[test]
    fn true_false_serializes_with_fixed_options() {
        let q = Question::true_false("The sun is a star.", false, "", Difficulty::Easy, None)
            .expect("valid");
        let value = serde_json::to_value(&q).expect("serialize");
        assert_eq!(value["type"], "true_false");
        assert_eq!(value["correct_answer"], "False");
        assert_eq!(value["options"], serde_json::json!(["True", "False"]));
        assert_eq!(value["difficulty"], "easy");
    }

    #[test]
    fn patch_emptiness_ignores_blank_values() {
        let patch = ArtifactPatch {
            summary: Some("   ".into()),
            quiz_questions: Some(vec![]),
            key_concepts: None,
        };
        assert!(patch.is_empty());
        assert_eq!(patch.normalized(), ArtifactPatch::default());

        let patch = ArtifactPatch {
            key_concepts: Some(vec!["X".into()]),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
