//! Prompt templates for the three study-aid tasks.

use crate::fallback::QuizMix;

pub fn summary(content: &str, max_length: usize) -> String {
    format!(
        "Write a single-paragraph, foreword-style introduction to the study material below.\n\
         Use the actual names, terms and facts it contains. Aim for about {max_length} words.\n\
         Return only the paragraph, with no title or commentary.\n\n\
         MATERIAL:\n{content}"
    )
}

pub fn quiz(content: &str, mix: QuizMix, strict: bool) -> String {
    let strict_rules = if strict {
        "\nYour previous answer could not be used. Every question MUST quote or paraphrase a \
         specific fact from the material. Do not ask about the document itself, its purpose, \
         its type, or its audience. Output the JSON array and nothing else.\n"
    } else {
        ""
    };

    format!(
        "Create a quiz from the study material below.\n\
         Produce exactly {mc} multiple_choice, {tf} true_false and {sa} short_answer questions.\n\
         Respond with a JSON array. Each element is one of:\n\
         {{\"type\": \"multiple_choice\", \"question\": str, \"options\": [4 strings], \
         \"correct_answer\": one of the options, \"explanation\": str, \
         \"difficulty\": \"easy\"|\"medium\"|\"hard\", \"concept\": str}}\n\
         {{\"type\": \"true_false\", \"question\": str, \"options\": [\"True\", \"False\"], \
         \"correct_answer\": \"True\"|\"False\", \"explanation\": str, \"difficulty\": str, \
         \"concept\": str}}\n\
         {{\"type\": \"short_answer\", \"question\": str, \"sample_answer\": str, \
         \"explanation\": str, \"difficulty\": str, \"concept\": str}}\n\
         {strict_rules}\n\
         MATERIAL:\n{content}",
        mc = mix.multiple_choice,
        tf = mix.true_false,
        sa = mix.short_answer,
    )
}

pub fn key_concepts(content: &str, max_count: usize) -> String {
    format!(
        "List the {max_count} most important concepts or terms in the study material below.\n\
         Skip generic words such as \"introduction\", \"summary\" or \"education\".\n\
         Respond with a JSON array of strings and nothing else.\n\n\
         MATERIAL:\n{content}"
    )
}
