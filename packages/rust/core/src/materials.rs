//! Material lifecycle: create from text or upload, list, fetch, delete.
//!
//! Creation stores the material first and then hands its text to the
//! [`Enricher`]; the caller's response never waits on generation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use studyaid_blob::BlobStore;
use studyaid_shared::{
    ArtifactSet, ContentKind, MIN_UPLOAD_TEXT_CHARS, Material, MaterialId, NewMaterial, Result,
    StudyAidError, User,
};
use studyaid_storage::{EnrichmentJob, Storage};

use crate::enrichment::Enricher;
use crate::extract;

/// A material together with whatever has been generated for it.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialWithArtifacts {
    pub material: Material,
    pub generated_data: Option<ArtifactSet>,
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct Materials {
    storage: Storage,
    blobs: Arc<dyn BlobStore>,
    enricher: Arc<Enricher>,
    signed_url_ttl_secs: u64,
}

impl Materials {
    pub fn new(
        storage: Storage,
        blobs: Arc<dyn BlobStore>,
        enricher: Arc<Enricher>,
        signed_url_ttl_secs: u64,
    ) -> Self {
        Self {
            storage,
            blobs,
            enricher,
            signed_url_ttl_secs,
        }
    }

    /// Store pasted text as a material and schedule enrichment.
    #[instrument(skip_all, fields(user_id = %owner.id))]
    pub async fn create_from_text(&self, owner: &User, title: &str, content: &str) -> Result<Material> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(StudyAidError::validation("Title is required"));
        }
        if content.is_empty() {
            return Err(StudyAidError::validation("Content is required"));
        }
        if content.chars().count() < MIN_UPLOAD_TEXT_CHARS {
            return Err(StudyAidError::validation(format!(
                "Content must be at least {MIN_UPLOAD_TEXT_CHARS} characters"
            )));
        }

        self.store(NewMaterial {
            title: title.to_string(),
            content: content.to_string(),
            content_type: ContentKind::Text,
            file_url: None,
            user_id: owner.id,
        })
        .await
    }

    /// Store an uploaded PDF or text file. PDFs are also kept in the blob store.
    #[instrument(skip_all, fields(user_id = %owner.id, content_type = %upload.content_type))]
    pub async fn create_from_upload(&self, owner: &User, title: &str, upload: Upload) -> Result<Material> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StudyAidError::validation("Title is required"));
        }

        let Upload {
            file_name,
            content_type,
            bytes,
        } = upload;
        let kind = extract::content_kind_for(&content_type)?;
        let (content, bytes) = extract::extract_text_blocking(kind, bytes).await?;

        let file_url = match kind {
            ContentKind::Pdf => {
                if !self.blobs.is_configured() {
                    return Err(StudyAidError::Unavailable("Storage service".into()));
                }
                let file_name = file_name.unwrap_or_else(|| format!("{title}.pdf"));
                let url = self
                    .blobs
                    .upload(bytes, &file_name, &content_type, owner.id)
                    .await?;
                info!(url, "uploaded PDF");
                Some(url)
            }
            ContentKind::Text => None,
        };

        self.store(NewMaterial {
            title: title.to_string(),
            content,
            content_type: kind,
            file_url,
            user_id: owner.id,
        })
        .await
    }

    async fn store(&self, new: NewMaterial) -> Result<Material> {
        let material = self.storage.insert_material(new).await?;
        info!(material_id = %material.id, "material stored");
        self.enricher.dispatch(material.id, material.content.clone());
        Ok(material)
    }

    /// The owner's materials, newest first, each with its artifacts.
    pub async fn history(&self, owner: &User) -> Result<Vec<MaterialWithArtifacts>> {
        let materials = self.storage.list_materials_for_user(owner.id).await?;
        let mut out = Vec::with_capacity(materials.len());
        for material in materials {
            let generated_data = self.storage.get_artifacts(material.id).await?;
            out.push(MaterialWithArtifacts {
                material,
                generated_data,
            });
        }
        Ok(out)
    }

    pub async fn get(&self, owner: &User, id: MaterialId) -> Result<MaterialWithArtifacts> {
        let material = self.owned(owner, id).await?;
        let generated_data = self.storage.get_artifacts(material.id).await?;
        Ok(MaterialWithArtifacts {
            material,
            generated_data,
        })
    }

    /// Delete a material, its artifacts and jobs. Blob removal is best-effort.
    #[instrument(skip_all, fields(user_id = %owner.id, material_id = %id))]
    pub async fn delete(&self, owner: &User, id: MaterialId) -> Result<()> {
        let material = self.owned(owner, id).await?;

        if let Some(url) = material.file_url.as_deref() {
            if self.blobs.is_configured() && !self.blobs.delete(url).await {
                warn!(url, "stored file was not deleted");
            }
        }

        self.storage.delete_material(material.id).await?;
        info!("material deleted");
        Ok(())
    }

    /// A signed link to the material's file, or its stored URL when signing
    /// is not possible.
    pub async fn download_url(&self, owner: &User, id: MaterialId) -> Result<String> {
        let material = self.owned(owner, id).await?;
        let Some(url) = material.file_url else {
            return Err(StudyAidError::NotFound("File for this material".into()));
        };
        if !self.blobs.is_configured() {
            return Ok(url);
        }
        Ok(self.blobs.sign(&url, self.signed_url_ttl_secs).await)
    }

    /// Latest background enrichment job for the material, if any ran.
    pub async fn enrichment_status(&self, owner: &User, id: MaterialId) -> Result<Option<EnrichmentJob>> {
        let material = self.owned(owner, id).await?;
        self.storage.latest_enrichment_job(material.id).await
    }

    async fn owned(&self, owner: &User, id: MaterialId) -> Result<Material> {
        self.storage
            .get_material_for_user(id, owner.id)
            .await?
            .ok_or_else(|| StudyAidError::NotFound("Material".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::make_test_pdf;
    use crate::testing::{FakeBlobStore, FakeGenerator};
    use studyaid_shared::EnrichmentSettings;
    use uuid::Uuid;

    const CONTENT: &str = "Mitochondria generate ATP through cellular respiration. \
        Ribosomes assemble proteins from amino acids in the cytoplasm.";

    struct Fixture {
        storage: Storage,
        blobs: Arc<FakeBlobStore>,
        materials: Materials,
        user: User,
    }

    async fn fixture(blobs: FakeBlobStore) -> Fixture {
        let tmp = std::env::temp_dir().join(format!("sa_materials_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        let user = storage
            .create_user("ada@example.com", "ada", "hash")
            .await
            .expect("user");
        let blobs = Arc::new(blobs);
        let enricher = Arc::new(Enricher::new(
            Arc::new(FakeGenerator::unavailable()),
            storage.clone(),
            EnrichmentSettings::default(),
        ));
        let materials = Materials::new(storage.clone(), blobs.clone(), enricher, 3600);
        Fixture {
            storage,
            blobs,
            materials,
            user,
        }
    }

    #[tokio::test]
    async fn text_material_validation() {
        let f = fixture(FakeBlobStore::configured()).await;
        let err = f.materials.create_from_text(&f.user, " ", CONTENT).await.unwrap_err();
        assert_eq!(err.to_string(), "validation error: Title is required");
        let err = f.materials.create_from_text(&f.user, "Cells", "").await.unwrap_err();
        assert!(err.to_string().contains("Content is required"));
        let err = f
            .materials
            .create_from_text(&f.user, "Cells", "too short")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 50 characters"));

        let m = f
            .materials
            .create_from_text(&f.user, "Cells", CONTENT)
            .await
            .expect("create");
        assert_eq!(m.content_type, ContentKind::Text);
        assert!(m.file_url.is_none());
    }

    #[tokio::test]
    async fn pdf_upload_stores_blob_and_text() {
        let f = fixture(FakeBlobStore::configured()).await;
        let upload = Upload {
            file_name: Some("cells.pdf".into()),
            content_type: "application/pdf".into(),
            bytes: make_test_pdf("Mitochondria generate ATP"),
        };

        let m = f
            .materials
            .create_from_upload(&f.user, "Cells", upload)
            .await
            .expect("upload");
        assert_eq!(m.content_type, ContentKind::Pdf);
        assert!(m.content.contains("Mitochondria"));
        assert_eq!(m.file_url.as_deref(), Some("https://blobs.test/cells.pdf"));
        assert_eq!(f.blobs.uploaded(), vec!["cells.pdf".to_string()]);
    }

    #[tokio::test]
    async fn pdf_upload_needs_blob_store() {
        let f = fixture(FakeBlobStore::unconfigured()).await;
        let upload = Upload {
            file_name: None,
            content_type: "application/pdf".into(),
            bytes: make_test_pdf("Mitochondria generate ATP"),
        };
        let err = f
            .materials
            .create_from_upload(&f.user, "Cells", upload)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyAidError::Unavailable(_)));
        assert!(f.materials.history(&f.user).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected() {
        let f = fixture(FakeBlobStore::configured()).await;
        let upload = Upload {
            file_name: Some("cat.png".into()),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let err = f
            .materials
            .create_from_upload(&f.user, "Cat", upload)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyAidError::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_removes_blob_and_rows() {
        let f = fixture(FakeBlobStore::configured()).await;
        let upload = Upload {
            file_name: Some("cells.pdf".into()),
            content_type: "application/pdf".into(),
            bytes: make_test_pdf("Mitochondria generate ATP"),
        };
        let m = f
            .materials
            .create_from_upload(&f.user, "Cells", upload)
            .await
            .expect("upload");

        f.materials.delete(&f.user, m.id).await.expect("delete");
        assert_eq!(f.blobs.deleted(), vec!["https://blobs.test/cells.pdf".to_string()]);
        assert!(f.storage.get_material(m.id).await.expect("get").is_none());

        let err = f.materials.delete(&f.user, m.id).await.unwrap_err();
        assert!(matches!(err, StudyAidError::NotFound(_)));
    }

    #[tokio::test]
    async fn download_url_is_signed_or_missing() {
        let f = fixture(FakeBlobStore::configured()).await;
        let text = f
            .materials
            .create_from_text(&f.user, "Cells", CONTENT)
            .await
            .expect("create");
        let err = f.materials.download_url(&f.user, text.id).await.unwrap_err();
        assert!(matches!(err, StudyAidError::NotFound(_)));

        let pdf = f
            .materials
            .create_from_upload(
                &f.user,
                "Cells",
                Upload {
                    file_name: Some("cells.pdf".into()),
                    content_type: "application/pdf".into(),
                    bytes: make_test_pdf("Mitochondria generate ATP"),
                },
            )
            .await
            .expect("upload");
        let url = f.materials.download_url(&f.user, pdf.id).await.expect("url");
        assert_eq!(url, "https://blobs.test/cells.pdf?token=signed&ttl=3600");
    }

    #[tokio::test]
    async fn history_is_newest_first_and_private() {
        let f = fixture(FakeBlobStore::configured()).await;
        let first = f
            .materials
            .create_from_text(&f.user, "First", CONTENT)
            .await
            .expect("create");
        let second = f
            .materials
            .create_from_text(&f.user, "Second", CONTENT)
            .await
            .expect("create");

        let history = f.materials.history(&f.user).await.expect("history");
        let ids: Vec<_> = history.iter().map(|h| h.material.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let other = f
            .storage
            .create_user("bob@example.com", "bob", "hash")
            .await
            .expect("user");
        assert!(f.materials.history(&other).await.expect("history").is_empty());
        assert!(f.materials.get(&other, first.id).await.is_err());
    }
}
