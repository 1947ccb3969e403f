//! Deterministic local generators used when the model is unavailable or its
//! output is unusable. None of these can fail.

use std::collections::HashMap;

use studyaid_shared::{Difficulty, Question};

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old",
    "see", "two", "who", "your", "said", "each", "make", "most", "over", "such", "time", "very",
    "what", "with", "have", "from", "they", "know", "want", "been", "good", "much", "some", "well",
    "were", "this", "that", "will", "would", "there", "their", "could", "should", "about",
    "after", "first", "never", "these", "think", "where", "being", "every", "great", "might",
    "shall", "still", "those", "under", "while", "before", "through", "between", "important",
    "example", "because", "however", "therefore", "although", "including", "according",
    "different", "following", "information", "which", "into", "than", "then", "them", "also",
    "when", "only", "other", "more", "does", "did",
];

/// Candidate key terms ranked by frequency, ties broken by first appearance.
pub fn key_terms(content: &str, min_len: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, word) in content.split_whitespace().enumerate() {
        let cleaned = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if cleaned.chars().count() < min_len
            || STOP_WORDS.contains(&cleaned.as_str())
            || cleaned.chars().all(|c| c.is_numeric())
        {
            continue;
        }
        counts
            .entry(cleaned)
            .and_modify(|(n, _)| *n += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (n, first))| (word, n, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().map(|(w, _, _)| title_case(&w)).collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Extractive summary: the opening sentence plus the dominant terms.
pub fn summary(content: &str, max_words: usize) -> String {
    let sentences: Vec<&str> = content
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut parts = Vec::new();
    if let Some(first) = sentences.first() {
        let words: Vec<&str> = first.split_whitespace().collect();
        let cap = max_words.max(10);
        if words.len() > cap {
            parts.push(format!("{}...", words[..cap].join(" ")));
        } else {
            parts.push(format!("{first}."));
        }
    }

    let terms: Vec<String> = key_terms(content, 5).into_iter().take(3).collect();
    match terms.as_slice() {
        [] => {}
        [only] => parts.push(format!("This material focuses on {only}.")),
        [init @ .., last] => parts.push(format!(
            "This material covers {} and {last}.",
            init.join(", ")
        )),
    }

    if sentences.len() > 2 {
        parts.push(
            "Reviewing it will help you understand these ideas and how they are applied.".into(),
        );
    }

    if parts.is_empty() {
        return "No readable text was available to summarize.".into();
    }
    parts.join("\n")
}

// ---------------------------------------------------------------------------
// Key concepts
// ---------------------------------------------------------------------------

/// Most frequent meaningful words, capped at `max_count`.
pub fn key_concepts(content: &str, max_count: usize) -> Vec<String> {
    key_terms(content, 4).into_iter().take(max_count).collect()
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

/// How a multiple-choice budget splits into true/false and four-option questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizMix {
    pub multiple_choice: usize,
    pub true_false: usize,
    pub short_answer: usize,
}

impl QuizMix {
    /// True/false gets a third of the budget (at least two), the rest is four-option.
    pub fn new(num_mcq: usize, num_short: usize) -> Self {
        let true_false = (num_mcq / 3).max(2).min(num_mcq);
        Self {
            multiple_choice: num_mcq - true_false,
            true_false,
            short_answer: num_short,
        }
    }

    pub fn total(&self) -> usize {
        self.multiple_choice + self.true_false + self.short_answer
    }
}

/// Templated quiz seeded with the content's key terms.
///
/// Counts are capped by the size of each template bank.
pub fn quiz(content: &str, num_mcq: usize, num_short: usize) -> Vec<Question> {
    let mix = QuizMix::new(num_mcq, num_short);
    let terms = key_terms(content, 5);
    let term = |i: usize, default: &str| terms.get(i).cloned().unwrap_or_else(|| default.into());
    let fallback_note = "Generated locally because AI generation was unavailable.";

    let mut mc_bank: Vec<(String, [String; 4], usize, &str)> = Vec::new();
    if !terms.is_empty() {
        mc_bank.push((
            "Which of these terms is most central to this material?".into(),
            [
                term(0, "Main concept"),
                "Unrelated term".into(),
                "Generic concept".into(),
                "Random topic".into(),
            ],
            0,
            "Key terms",
        ));
        mc_bank.push((
            "Which concept does the material emphasize most?".into(),
            [
                term(1, "Primary concept"),
                term(2, "Secondary concept"),
                "Unrelated concept".into(),
                "Minor detail".into(),
            ],
            0,
            "Emphasis",
        ));
    }
    mc_bank.push((
        "What should a reader focus on first in this material?".into(),
        [
            "The central ideas it presents".into(),
            "Unrelated topics".into(),
            "Trivia".into(),
            "Formatting".into(),
        ],
        0,
        "Focus",
    ));
    mc_bank.push((
        "How would you characterize the depth of this material?".into(),
        [
            "Detailed and substantive".into(),
            "Superficial".into(),
            "Unreadable".into(),
            "Incomplete".into(),
        ],
        0,
        "Depth",
    ));
    mc_bank.push((
        "Which study approach suits this material best?".into(),
        [
            "Active recall and review".into(),
            "Skimming once".into(),
            "Rote copying".into(),
            "Ignoring examples".into(),
        ],
        0,
        "Study strategy",
    ));

    let tf_bank: [(&str, bool, &str, &str); 4] = [
        (
            "Understanding this material requires careful study.",
            true,
            "The material introduces ideas that reward close reading.",
            "Study effort",
        ),
        (
            "This material only touches on its subject superficially.",
            false,
            "The material develops its ideas beyond a surface treatment.",
            "Depth",
        ),
        (
            "The material can be mastered without any active engagement.",
            false,
            "Working through the ideas actively is needed to retain them.",
            "Active learning",
        ),
        (
            "Reviewing and practicing will help you master these ideas.",
            true,
            "Repeated exposure and practice consolidate understanding.",
            "Practice",
        ),
    ];

    let listed = terms.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    let mut short_bank: Vec<(String, String, &str, &str)> = Vec::new();
    if !terms.is_empty() {
        short_bank.push((
            "Explain how the key ideas in this material relate to each other.".into(),
            format!("The material connects {listed}, each building on the others."),
            "Identify the main ideas and describe how they connect.",
            "Relationships",
        ));
        short_bank.push((
            format!("How would you apply what you learned about {} to a new problem?", term(0, "the topic")),
            format!("Start from the principles of {} and apply them step by step.", term(0, "the topic")),
            "Show how the ideas transfer to a practical situation.",
            "Application",
        ));
    }
    short_bank.push((
        "What are the most important takeaways from this material?".into(),
        "The core ideas, why they matter, and where they apply.".into(),
        "Name the key ideas and justify their importance.",
        "Takeaways",
    ));
    short_bank.push((
        "How would you explain this material to someone new to the subject?".into(),
        "Define the basic terms, give an example, then connect the ideas.".into(),
        "Teaching the material shows you understand it.",
        "Explanation",
    ));

    let mut questions = Vec::with_capacity(mix.total());

    for (text, options, correct, concept) in mc_bank.into_iter().take(mix.multiple_choice) {
        let answer = options[correct].clone();
        if let Ok(q) = Question::multiple_choice(
            text,
            options.to_vec(),
            answer,
            fallback_note,
            Difficulty::Easy,
            Some(concept.into()),
        ) {
            questions.push(q);
        }
    }

    for (text, answer, explanation, concept) in tf_bank.into_iter().take(mix.true_false) {
        if let Ok(q) =
            Question::true_false(text, answer, explanation, Difficulty::Easy, Some(concept.into()))
        {
            questions.push(q);
        }
    }

    for (text, sample, explanation, concept) in short_bank.into_iter().take(mix.short_answer) {
        if let Ok(q) = Question::short_answer(
            text,
            sample,
            explanation,
            Difficulty::Medium,
            Some(concept.into()),
        ) {
            questions.push(q);
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Photosynthesis converts light energy into chemical energy. \
        Chlorophyll absorbs light in the chloroplast. Photosynthesis releases oxygen. \
        Glucose stores the captured energy for the plant.";

    #[test]
    fn mix_carves_true_false_from_mcq_budget() {
        assert_eq!(
            QuizMix::new(8, 4),
            QuizMix {
                multiple_choice: 6,
                true_false: 2,
                short_answer: 4
            }
        );
        assert_eq!(QuizMix::new(12, 1).true_false, 4);
        assert_eq!(QuizMix::new(1, 1).true_false, 1);
        assert_eq!(QuizMix::new(1, 1).multiple_choice, 0);
    }

    #[test]
    fn key_terms_rank_by_frequency() {
        let terms = key_terms(TEXT, 5);
        // "energy" appears three times, "photosynthesis" twice.
        assert_eq!(terms[0], "Energy");
        assert_eq!(terms[1], "Photosynthesis");
        assert!(!terms.iter().any(|t| t.eq_ignore_ascii_case("the")));
    }

    #[test]
    fn summary_is_never_empty() {
        assert!(!summary("", 300).is_empty());
        let s = summary(TEXT, 300);
        assert!(s.starts_with("Photosynthesis converts light energy into chemical energy."));
        assert!(s.contains("This material covers"));
    }

    #[test]
    fn concepts_respect_cap() {
        assert_eq!(key_concepts(TEXT, 3).len(), 3);
        assert!(key_concepts("", 5).is_empty());
    }

    #[test]
    fn quiz_matches_distribution_within_bank_limits() {
        let quiz = quiz(TEXT, 8, 4);
        let count = |kind: &str| quiz.iter().filter(|q| q.kind() == kind).count();
        assert_eq!(count("multiple_choice"), 5);
        assert_eq!(count("true_false"), 2);
        assert_eq!(count("short_answer"), 4);
    }

    #[test]
    fn quiz_without_terms_still_valid() {
        let quiz = quiz("a b c", 4, 1);
        assert_eq!(quiz.len(), 5);
        assert!(quiz.iter().all(|q| !q.question().is_empty()));
    }
}
