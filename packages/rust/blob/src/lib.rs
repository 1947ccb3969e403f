//! Object storage for uploaded files.
//!
//! [`BlobStore`] is the narrow interface the server uses; [`SupabaseBlobStore`]
//! implements it over the Supabase Storage REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use studyaid_shared::{BlobStorageConfig, Result, StudyAidError, UserId, read_secret};
use tracing::{info, warn};
use uuid::Uuid;

/// Stores uploaded files and hands out download links.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Which pieces of configuration are present.
    fn status(&self) -> BlobStatus;

    /// Store `bytes` under a fresh per-owner path and return its public URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
        owner: UserId,
    ) -> Result<String>;

    /// Remove the object behind `url`. Returns whether anything was deleted.
    async fn delete(&self, url: &str) -> bool;

    /// A time-limited link for `url`, or `url` itself when signing fails.
    async fn sign(&self, url: &str, ttl_secs: u64) -> String;
}

/// Configuration presence flags, reported by `/health/storage`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlobStatus {
    pub supabase_url: bool,
    pub supabase_anon_key: bool,
    pub supabase_service_role_key: bool,
    pub bucket_name: String,
    pub storage_url: bool,
    pub client_initialized: bool,
    pub is_configured: bool,
}

/// Resolved Supabase connection settings.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service-role key when available, anon key otherwise.
    pub key: String,
    /// Public prefix under which uploaded objects are addressed.
    pub public_url: String,
    pub bucket: String,
}

pub struct SupabaseBlobStore {
    client: reqwest::Client,
    settings: Option<SupabaseSettings>,
    status: BlobStatus,
}

impl SupabaseBlobStore {
    pub fn new(settings: SupabaseSettings) -> Result<Self> {
        let status = BlobStatus {
            supabase_url: true,
            supabase_anon_key: false,
            supabase_service_role_key: true,
            bucket_name: settings.bucket.clone(),
            storage_url: true,
            client_initialized: true,
            is_configured: true,
        };
        Ok(Self {
            client: build_client()?,
            settings: Some(settings),
            status,
        })
    }

    /// Resolve settings from the env vars named in config. Missing values
    /// yield an unconfigured store rather than an error.
    pub fn from_config(config: &BlobStorageConfig) -> Result<Self> {
        let url = read_secret(&config.url_env);
        let service_key = read_secret(&config.service_key_env);
        let anon_key = read_secret(&config.anon_key_env);
        let public_url = read_secret(&config.public_url_env);

        let settings = match (&url, service_key.as_ref().or(anon_key.as_ref()), &public_url) {
            (Some(url), Some(key), Some(public_url)) => Some(SupabaseSettings {
                url: url.trim_end_matches('/').to_string(),
                key: key.clone(),
                public_url: public_url.trim_end_matches('/').to_string(),
                bucket: config.bucket.clone(),
            }),
            _ => {
                warn!(
                    url = url.is_some(),
                    key = service_key.is_some() || anon_key.is_some(),
                    public_url = public_url.is_some(),
                    "Supabase storage not configured, PDF uploads disabled"
                );
                None
            }
        };

        let status = BlobStatus {
            supabase_url: url.is_some(),
            supabase_anon_key: anon_key.is_some(),
            supabase_service_role_key: service_key.is_some(),
            bucket_name: config.bucket.clone(),
            storage_url: public_url.is_some(),
            client_initialized: settings.is_some(),
            is_configured: settings.is_some(),
        };

        Ok(Self {
            client: build_client()?,
            settings,
            status,
        })
    }

    fn object_url(s: &SupabaseSettings, object_path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", s.url, s.bucket, object_path)
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("StudyAid/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| StudyAidError::Network(format!("client build: {e}")))
}

/// `user_{owner}/{YYYYmmdd_HHMMSS}_{8 hex}.{ext}`; extension defaults to `pdf`.
pub fn object_path(owner: UserId, file_name: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    // The tail of a v7 id is random.
    let unique = Uuid::now_v7().simple().to_string();
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("pdf")
        .to_ascii_lowercase();
    format!("user_{owner}/{timestamp}_{}.{ext}", &unique[unique.len() - 8..])
}

/// The object path encoded in a public URL, if it was issued under `public_url`.
fn path_from_url<'a>(public_url: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(public_url)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|p| !p.is_empty())
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    fn status(&self) -> BlobStatus {
        self.status.clone()
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
        owner: UserId,
    ) -> Result<String> {
        let s = self
            .settings
            .as_ref()
            .ok_or_else(|| StudyAidError::Unavailable("Storage service".into()))?;

        let path = object_path(owner, file_name);
        let size = bytes.len();
        let response = self
            .client
            .post(Self::object_url(s, &path))
            .bearer_auth(&s.key)
            .header("apikey", &s.key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StudyAidError::Network(format!("storage upload: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StudyAidError::Network(format!(
                "storage upload: HTTP {status}: {detail}"
            )));
        }

        let public_url = format!("{}/{path}", s.public_url);
        info!(%owner, path = %path, bytes = size, "file uploaded");
        Ok(public_url)
    }

    async fn delete(&self, url: &str) -> bool {
        let Some(s) = &self.settings else {
            return false;
        };
        let Some(path) = path_from_url(&s.public_url, url) else {
            warn!(url, "not a storage URL, nothing deleted");
            return false;
        };

        let result = self
            .client
            .delete(format!("{}/storage/v1/object/{}", s.url, s.bucket))
            .bearer_auth(&s.key)
            .header("apikey", &s.key)
            .json(&serde_json::json!({ "prefixes": [path] }))
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(path, status = %r.status(), "storage delete rejected");
                return false;
            }
            Err(e) => {
                warn!(path, error = %e, "storage delete failed");
                return false;
            }
        };

        // The API answers with the list of removed objects.
        match response.json::<Vec<serde_json::Value>>().await {
            Ok(removed) if !removed.is_empty() => {
                info!(path, "file deleted");
                true
            }
            _ => false,
        }
    }

    async fn sign(&self, url: &str, ttl_secs: u64) -> String {
        let Some(s) = &self.settings else {
            return url.to_string();
        };
        let Some(path) = path_from_url(&s.public_url, url) else {
            return url.to_string();
        };

        let result = self
            .client
            .post(format!(
                "{}/storage/v1/object/sign/{}/{}",
                s.url, s.bucket, path
            ))
            .bearer_auth(&s.key)
            .header("apikey", &s.key)
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await;

        let signed = match result {
            Ok(r) if r.status().is_success() => r.json::<SignResponse>().await.ok(),
            Ok(r) => {
                warn!(path, status = %r.status(), "signing rejected");
                None
            }
            Err(e) => {
                warn!(path, error = %e, "signing failed");
                None
            }
        };

        match signed {
            Some(SignResponse { signed_url }) if signed_url.starts_with("http") => signed_url,
            Some(SignResponse { signed_url }) => format!("{}/storage/v1{signed_url}", s.url),
            None => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> SupabaseBlobStore {
        SupabaseBlobStore::new(SupabaseSettings {
            url: server.uri(),
            key: "service-key".into(),
            public_url: "https://cdn.example.com/study-materials".into(),
            bucket: "study-materials".into(),
        })
        .expect("store")
    }

    #[test]
    fn object_paths_are_scoped_per_owner() {
        let owner = UserId::new();
        let p = object_path(owner, "Lecture Notes.PDF");
        assert!(p.starts_with(&format!("user_{owner}/")));
        assert!(p.ends_with(".pdf"));

        let p = object_path(owner, "no-extension");
        assert!(p.ends_with(".pdf"));
    }

    #[test]
    fn only_own_urls_map_to_paths() {
        let base = "https://cdn.example.com/bucket";
        assert_eq!(
            path_from_url(base, "https://cdn.example.com/bucket/user_1/a.pdf"),
            Some("user_1/a.pdf")
        );
        assert_eq!(path_from_url(base, "https://elsewhere.com/a.pdf"), None);
        assert_eq!(path_from_url(base, base), None);
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/study-materials/user_.+\.pdf$"))
            .and(header("authorization", "Bearer service-key"))
            .and(header("x-upsert", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "study-materials/user_x/file.pdf"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let url = store
            .upload(b"%PDF-1.4".to_vec(), "notes.pdf", "application/pdf", UserId::new())
            .await
            .expect("upload");
        assert!(url.starts_with("https://cdn.example.com/study-materials/user_"));
    }

    #[tokio::test]
    async fn upload_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Duplicate"))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .upload(vec![1, 2, 3], "a.pdf", "application/pdf", UserId::new())
            .await;
        assert!(matches!(result, Err(StudyAidError::Network(_))));
    }

    #[tokio::test]
    async fn delete_and_sign_use_object_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/study-materials"))
            .and(body_json(serde_json::json!({ "prefixes": ["user_1/a.pdf"] })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "name": "user_1/a.pdf" }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/study-materials/user_1/a.pdf"))
            .and(body_json(serde_json::json!({ "expiresIn": 3600 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/study-materials/user_1/a.pdf?token=abc"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let url = "https://cdn.example.com/study-materials/user_1/a.pdf";

        let signed = store.sign(url, 3600).await;
        assert_eq!(
            signed,
            format!(
                "{}/storage/v1/object/sign/study-materials/user_1/a.pdf?token=abc",
                server.uri()
            )
        );
        assert!(store.delete(url).await);
        assert!(!store.delete("https://elsewhere.com/a.pdf").await);
    }

    #[tokio::test]
    async fn unconfigured_store_degrades() {
        let config = BlobStorageConfig {
            url_env: "SA_TEST_UNSET_SUPABASE_URL_1".into(),
            service_key_env: "SA_TEST_UNSET_SUPABASE_KEY_1".into(),
            anon_key_env: "SA_TEST_UNSET_SUPABASE_ANON_1".into(),
            public_url_env: "SA_TEST_UNSET_SUPABASE_PUBLIC_1".into(),
            ..BlobStorageConfig::default()
        };
        let store = SupabaseBlobStore::from_config(&config).expect("store");
        assert!(!store.is_configured());
        assert!(!store.status().is_configured);
        assert_eq!(store.status().bucket_name, "study-materials");

        let err = store
            .upload(vec![], "a.pdf", "application/pdf", UserId::new())
            .await
            .expect_err("unconfigured");
        assert!(matches!(err, StudyAidError::Unavailable(_)));
        assert_eq!(store.sign("https://x/y.pdf", 60).await, "https://x/y.pdf");
        assert!(!store.delete("https://x/y.pdf").await);
    }
}
