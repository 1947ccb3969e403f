//! Study-aid text generation for StudyAid.
//!
//! [`StudyGenerator`] is the capability the rest of the workspace depends on.
//! [`LlmStudyGenerator`] implements it over any [`LlmBackend`] (in production,
//! [`GeminiClient`]), validating model output and degrading to the
//! deterministic generators in [`fallback`].

pub mod fallback;
pub mod gemini;
pub mod generator;
pub mod prompts;
pub mod validate;

pub use fallback::QuizMix;
pub use gemini::{GeminiClient, LlmBackend};
pub use generator::{LlmStudyGenerator, StudyGenerator};
