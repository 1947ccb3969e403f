//! Shared types, error model, and configuration for StudyAid.
//!
//! This crate is the foundation depended on by all other StudyAid crates.
//! It provides:
//! - [`StudyAidError`], the unified error type
//! - Domain types ([`Material`], [`Question`], [`ArtifactSet`], [`User`])
//! - Configuration ([`AppConfig`], [`EnrichmentSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuthConfig, BlobStorageConfig, DatabaseConfig, EnrichmentSection,
    EnrichmentSettings, GeminiConfig, ServerConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, read_secret,
};
pub use error::{Result, StudyAidError};
pub use types::{
    ArtifactPatch, ArtifactSet, CONCEPTS_RANGE, ContentKind, Difficulty, MCQ_RANGE,
    MIN_CONCEPTS_CONTENT_CHARS, MIN_QUIZ_CONTENT_CHARS, MIN_SUMMARY_CONTENT_CHARS,
    MIN_UPLOAD_TEXT_CHARS, MULTIPLE_CHOICE_OPTIONS, Material, MaterialId, MultipleChoice,
    NewMaterial, Question, SHORT_ANSWER_RANGE, SUMMARY_LENGTH_RANGE, ShortAnswer, TrueFalse, User,
    UserId,
};
