//! Application configuration for StudyAid.
//!
//! Server config lives at `~/.studyaid/studyaid.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never written to the file; it names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyAidError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "studyaid.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".studyaid";

// ---------------------------------------------------------------------------
// Config structs (matching studyaid.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Gemini text generation settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Supabase object storage settings.
    #[serde(default)]
    pub storage: BlobStorageConfig,

    /// Session token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Background enrichment tuning.
    #[serde(default)]
    pub enrichment: EnrichmentSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Browser origins allowed by CORS (credentials enabled).
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:3001".into(),
        "http://127.0.0.1:3000".into(),
        "http://127.0.0.1:3001".into(),
    ]
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.studyaid/studyaid.db".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used for every generation task.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// REST endpoint root.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_gemini_timeout() -> u64 {
    60
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Env var holding the Supabase project URL.
    #[serde(default = "default_supabase_url_env")]
    pub url_env: String,

    /// Env var holding the service-role key (preferred).
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,

    /// Env var holding the anon key (used when no service key is set).
    #[serde(default = "default_anon_key_env")]
    pub anon_key_env: String,

    /// Env var holding the public object URL prefix for the bucket.
    #[serde(default = "default_public_url_env")]
    pub public_url_env: String,

    /// Bucket that receives uploaded PDFs.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Lifetime of download links.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            url_env: default_supabase_url_env(),
            service_key_env: default_service_key_env(),
            anon_key_env: default_anon_key_env(),
            public_url_env: default_public_url_env(),
            bucket: default_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }
}

fn default_supabase_url_env() -> String {
    "SUPABASE_URL".into()
}
fn default_service_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".into()
}
fn default_anon_key_env() -> String {
    "SUPABASE_ANON_KEY".into()
}
fn default_public_url_env() -> String {
    "SUPABASE_STORAGE_URL".into()
}
fn default_bucket() -> String {
    "study-materials".into()
}
fn default_signed_url_ttl() -> u64 {
    3600
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,

    /// Whether the session cookie carries the `Secure` attribute.
    #[serde(default)]
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl(),
            cookie_secure: false,
        }
    }
}

fn default_token_ttl() -> i64 {
    30
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Content shorter than this is never enriched.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Content is cut to this many characters before generation.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Advisory summary length passed to the generator.
    #[serde(default = "default_summary_length")]
    pub summary_max_length: usize,

    /// Multiple-choice budget (true/false questions are carved out of it).
    #[serde(default = "default_quiz_mcq")]
    pub quiz_mcq: usize,

    /// Short-answer question count.
    #[serde(default = "default_quiz_short")]
    pub quiz_short: usize,

    /// Maximum key concepts kept.
    #[serde(default = "default_max_concepts")]
    pub max_concepts: usize,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            max_content_chars: default_max_content_chars(),
            summary_max_length: default_summary_length(),
            quiz_mcq: default_quiz_mcq(),
            quiz_short: default_quiz_short(),
            max_concepts: default_max_concepts(),
        }
    }
}

fn default_min_content_chars() -> usize {
    50
}
fn default_max_content_chars() -> usize {
    8_000
}
fn default_summary_length() -> usize {
    300
}
fn default_quiz_mcq() -> usize {
    8
}
fn default_quiz_short() -> usize {
    4
}
fn default_max_concepts() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Enrichment settings (runtime, derived from config)
// ---------------------------------------------------------------------------

/// Runtime enrichment settings handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub min_content_chars: usize,
    pub max_content_chars: usize,
    pub summary_max_length: usize,
    pub quiz_mcq: usize,
    pub quiz_short: usize,
    pub max_concepts: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EnrichmentSettings {
    fn from(config: &AppConfig) -> Self {
        let e = &config.enrichment;
        Self {
            min_content_chars: e.min_content_chars,
            max_content_chars: e.max_content_chars,
            summary_max_length: e.summary_max_length,
            quiz_mcq: e.quiz_mcq,
            quiz_short: e.quiz_short,
            max_concepts: e.max_concepts,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.studyaid/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| StudyAidError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.studyaid/studyaid.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StudyAidError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StudyAidError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StudyAidError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StudyAidError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StudyAidError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named env var. Empty values count as unset.
pub fn read_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("study-materials"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let toml_str = r#"
[server]
port = 9100

[enrichment]
quiz_mcq = 6
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.enrichment.quiz_mcq, 6);
        assert_eq!(config.enrichment.max_content_chars, 8_000);
        assert_eq!(config.gemini.model, "gemini-2.5-flash-lite");
        assert_eq!(config.auth.token_ttl_minutes, 30);
    }

    #[test]
    fn enrichment_settings_from_app_config() {
        let settings = EnrichmentSettings::from(&AppConfig::default());
        assert_eq!(settings.min_content_chars, 50);
        assert_eq!(settings.max_content_chars, 8_000);
        assert_eq!(settings.quiz_mcq, 8);
        assert_eq!(settings.quiz_short, 4);
        assert_eq!(settings.max_concepts, 10);
    }

    #[test]
    fn unset_secret_is_none() {
        assert!(read_secret("SA_TEST_NONEXISTENT_SECRET_98765").is_none());
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
        assert!(!expand_home("~/x.db").to_string_lossy().starts_with('~'));
    }
}
