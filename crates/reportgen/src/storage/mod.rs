//! Object storage for finished report files.

mod bucket;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{StorageBackend, StorageConfig};

use bucket::{BucketAdmin, Credentials};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Bucket '{bucket}' is not available (HTTP {status})")]
    BucketUnavailable { bucket: String, status: u16 },

    #[error("Bucket request for '{bucket}' failed: {source}")]
    BucketRequest {
        bucket: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Creating bucket '{bucket}' was rejected (HTTP {status}): {body}")]
    CreateBucketRejected {
        bucket: String,
        status: u16,
        body: String,
    },

    #[error("Failed to create bucket directory '{path}': {source}")]
    CreateBucket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload '{key}': {source}")]
    Put {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to read '{key}' back: {source}")]
    Get {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to sign URL for '{key}': {source}")]
    Sign {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage configuration: {0}")]
    Config(String),
}

/// Where an uploaded report ended up and how to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub bucket: String,
    pub key: String,
    pub url: String,
    pub expires_in: Option<u64>,
}

enum Backend {
    S3 {
        client: Arc<AmazonS3>,
        admin: BucketAdmin,
    },
    Local(PathBuf),
    Memory,
}

pub struct ReportStore {
    store: Arc<dyn ObjectStore>,
    backend: Backend,
    bucket: String,
    url_expiry: Duration,
}

impl ReportStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self, UploadError> {
        let expiry = Duration::from_secs(config.url_expiry_secs);
        match config.backend {
            StorageBackend::S3 => Self::s3(config),
            StorageBackend::Local => {
                let root = match &config.root {
                    Some(root) => PathBuf::from(root),
                    None => dirs::home_dir()
                        .map(|h| h.join(".reportgen").join("storage"))
                        .ok_or_else(|| {
                            UploadError::Config("no storage root and no home directory".into())
                        })?,
                };
                Self::local(root, &config.bucket, expiry)
            }
            StorageBackend::Memory => Ok(Self::memory(&config.bucket)),
        }
    }

    /// S3 or any S3-compatible service. Credentials fall back to the
    /// standard `AWS_*` environment when none are configured.
    pub fn s3(config: &StorageConfig) -> Result<Self, UploadError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.allow_http);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }

        let credentials = config
            .resolve_credentials()
            .map_err(|e| UploadError::Config(e.to_string()))?;
        let admin_credentials = match credentials {
            Some((access, secret)) => {
                builder = builder
                    .with_access_key_id(access.expose_secret())
                    .with_secret_access_key(secret.expose_secret());
                Some(Credentials {
                    access_key: access,
                    secret_key: secret,
                    session_token: None,
                })
            }
            None => Credentials::from_env(),
        };
        let admin = BucketAdmin::new(
            config.endpoint.as_deref(),
            &config.bucket,
            &config.region,
            admin_credentials,
        )?;

        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| UploadError::Config(format!("Failed to create S3 client: {}", e)))?,
        );

        Ok(Self {
            store: s3.clone(),
            backend: Backend::S3 { client: s3, admin },
            bucket: config.bucket.clone(),
            url_expiry: Duration::from_secs(config.url_expiry_secs),
        })
    }

    /// Filesystem backend; each bucket is a directory under `root`.
    pub fn local(
        root: impl AsRef<Path>,
        bucket: &str,
        url_expiry: Duration,
    ) -> Result<Self, UploadError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| UploadError::CreateBucket {
            path: root.to_path_buf(),
            source: e,
        })?;
        let root = root.canonicalize().map_err(|e| UploadError::CreateBucket {
            path: root.to_path_buf(),
            source: e,
        })?;
        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| UploadError::Config(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            backend: Backend::Local(root),
            bucket: bucket.to_string(),
            url_expiry,
        })
    }

    pub fn memory(bucket: &str) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend: Backend::Memory,
            bucket: bucket.to_string(),
            url_expiry: Duration::from_secs(3600),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), UploadError> {
        match &self.backend {
            Backend::S3 { admin, .. } => admin.ensure().await?,
            Backend::Local(root) => {
                let dir = root.join(&self.bucket);
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| UploadError::CreateBucket { path: dir, source: e })?;
            }
            Backend::Memory => {}
        }
        Ok(())
    }

    /// Writes `bytes` under `{uuid}_{file_name}` and returns a retrieval URL.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<StoredReport, UploadError> {
        self.ensure_bucket().await?;

        let key = format!("{}_{}", uuid::Uuid::new_v4(), file_name);
        let location = self.location(&key);
        let size = bytes.len();

        let content_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();
        let mut opts = PutOptions::default();
        // LocalFileSystem rejects object attributes.
        if !matches!(self.backend, Backend::Local(_)) {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.clone().into());
            opts.attributes = attributes;
        }

        self.store
            .put_opts(&location, PutPayload::from(bytes), opts)
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket, key = %key, error = %e, "Report upload failed");
                UploadError::Put {
                    key: key.clone(),
                    source: e,
                }
            })?;

        let (url, expires_in) = self.retrieval_url(&key).await?;
        info!(
            bucket = %self.bucket,
            key = %key,
            size,
            content_type = %content_type,
            "Report uploaded"
        );

        Ok(StoredReport {
            bucket: self.bucket.clone(),
            key,
            url,
            expires_in,
        })
    }

    /// Uploads a file from disk under its own file name.
    pub async fn upload_file(&self, path: &Path) -> Result<StoredReport, UploadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report.bin")
            .to_string();
        self.upload(&file_name, bytes).await
    }

    /// Reads an uploaded object back.
    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>, UploadError> {
        let location = self.location(key);
        let result = self.store.get(&location).await.map_err(|e| UploadError::Get {
            key: key.to_string(),
            source: e,
        })?;
        let bytes = result.bytes().await.map_err(|e| UploadError::Get {
            key: key.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }

    fn location(&self, key: &str) -> ObjectPath {
        match self.backend {
            // The S3 client is already scoped to the bucket.
            Backend::S3 { .. } => ObjectPath::from(key),
            Backend::Local(_) | Backend::Memory => {
                ObjectPath::from(format!("{}/{}", self.bucket, key))
            }
        }
    }

    async fn retrieval_url(&self, key: &str) -> Result<(String, Option<u64>), UploadError> {
        match &self.backend {
            Backend::S3 { client, .. } => {
                let url = client
                    .signed_url(reqwest::Method::GET, &self.location(key), self.url_expiry)
                    .await
                    .map_err(|e| UploadError::Sign {
                        key: key.to_string(),
                        source: e,
                    })?;
                debug!(key = %key, expires_in = self.url_expiry.as_secs(), "Signed report URL");
                Ok((url.to_string(), Some(self.url_expiry.as_secs())))
            }
            Backend::Local(root) => {
                let path = root.join(&self.bucket).join(key);
                Ok((format!("file://{}", path.display()), None))
            }
            Backend::Memory => Ok((format!("memory:///{}/{}", self.bucket, key), None)),
        }
    }
}
