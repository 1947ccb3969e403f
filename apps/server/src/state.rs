//! Shared handles injected into every handler.

use std::sync::Arc;

use studyaid_blob::{BlobStore, SupabaseBlobStore};
use studyaid_core::{Enricher, Materials};
use studyaid_llm::{GeminiClient, LlmStudyGenerator, StudyGenerator};
use studyaid_shared::{AppConfig, EnrichmentSettings, Result, expand_home};
use studyaid_storage::Storage;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    pub generator: Arc<dyn StudyGenerator>,
    pub blobs: Arc<dyn BlobStore>,
    pub enricher: Arc<Enricher>,
    pub materials: Arc<Materials>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Storage,
        generator: Arc<dyn StudyGenerator>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let enricher = Arc::new(Enricher::new(
            Arc::clone(&generator),
            storage.clone(),
            EnrichmentSettings::from(&config),
        ));
        let materials = Arc::new(Materials::new(
            storage.clone(),
            Arc::clone(&blobs),
            Arc::clone(&enricher),
            config.storage.signed_url_ttl_secs,
        ));
        Self {
            config: Arc::new(config),
            storage,
            generator,
            blobs,
            enricher,
            materials,
        }
    }

    /// Open the database and build the external capabilities once.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let db_path = expand_home(&config.database.path);
        let storage = Storage::open(&db_path).await?;
        info!(path = %db_path.display(), "database ready");

        let generator: Arc<dyn StudyGenerator> = match GeminiClient::from_config(&config.gemini)? {
            Some(client) => {
                info!(model = %config.gemini.model, "text generation enabled");
                Arc::new(LlmStudyGenerator::new(Arc::new(client)))
            }
            None => Arc::new(LlmStudyGenerator::unconfigured()),
        };
        let blobs: Arc<dyn BlobStore> = Arc::new(SupabaseBlobStore::from_config(&config.storage)?);

        Ok(Self::new(config, storage, generator, blobs))
    }
}
