//! Bucket provisioning against S3-compatible endpoints.
//!
//! `object_store` only addresses objects inside an existing bucket, so the
//! bucket itself is checked and created here with SigV4-signed
//! path-style requests.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::UploadError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const DEFAULT_REGION: &str = "us-east-1";

/// Signing identity for bucket-level calls.
#[derive(Clone)]
pub(crate) struct Credentials {
    pub access_key: SecretString,
    pub secret_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl Credentials {
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Option<Self> {
        let access = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key: SecretString::from(access),
            secret_key: SecretString::from(secret),
            session_token: std::env::var("AWS_SESSION_TOKEN").ok().map(SecretString::from),
        })
    }
}

pub(crate) struct BucketAdmin {
    http: reqwest::Client,
    url: Url,
    bucket: String,
    region: String,
    credentials: Option<Credentials>,
}

impl BucketAdmin {
    /// Without an endpoint the regional AWS endpoint is used.
    pub fn new(
        endpoint: Option<&str>,
        bucket: &str,
        region: &str,
        credentials: Option<Credentials>,
    ) -> Result<Self, UploadError> {
        let base = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", region),
        };
        let url = Url::parse(&format!("{}/{}", base, bucket))
            .map_err(|e| UploadError::Config(format!("Invalid S3 endpoint '{}': {}", base, e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            bucket: bucket.to_string(),
            region: region.to_string(),
            credentials,
        })
    }

    /// HEAD the bucket; on 404 create it. Losing a creation race to
    /// another writer counts as success.
    pub async fn ensure(&self) -> Result<(), UploadError> {
        let status = self.send(Method::HEAD, Vec::new()).await?.status();
        if status.is_success() {
            debug!(bucket = %self.bucket, "Bucket exists");
            return Ok(());
        }
        if status != StatusCode::NOT_FOUND {
            return Err(UploadError::BucketUnavailable {
                bucket: self.bucket.clone(),
                status: status.as_u16(),
            });
        }

        let response = self.send(Method::PUT, self.create_body()).await?;
        let status = response.status();
        if status.is_success() {
            info!(bucket = %self.bucket, region = %self.region, "Bucket created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT && body.contains("BucketAlreadyOwnedByYou") {
            return Ok(());
        }
        Err(UploadError::CreateBucketRejected {
            bucket: self.bucket.clone(),
            status: status.as_u16(),
            body,
        })
    }

    fn create_body(&self) -> Vec<u8> {
        if self.region == DEFAULT_REGION {
            return Vec::new();
        }
        format!(
            "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <LocationConstraint>{}</LocationConstraint>\
             </CreateBucketConfiguration>",
            self.region
        )
        .into_bytes()
    }

    async fn send(&self, method: Method, body: Vec<u8>) -> Result<reqwest::Response, UploadError> {
        let payload_hash = hex::encode(Sha256::digest(&body));
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let mut request = self
            .http
            .request(method.clone(), self.url.clone())
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash);

        if let Some(credentials) = &self.credentials {
            let authorization = authorization(
                &SigningRequest {
                    method: method.as_str(),
                    url: &self.url,
                    amz_date: &amz_date,
                    payload_hash: &payload_hash,
                    region: &self.region,
                },
                credentials,
            )?;
            request = request.header("authorization", authorization);
            if let Some(token) = &credentials.session_token {
                request = request.header("x-amz-security-token", token.expose_secret());
            }
        }

        request
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::BucketRequest {
                bucket: self.bucket.clone(),
                source: e,
            })
    }
}

pub(crate) struct SigningRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub amz_date: &'a str,
    pub payload_hash: &'a str,
    pub region: &'a str,
}

/// `Host` as the HTTP client sends it: default ports are omitted.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// SigV4 `Authorization` header value for a request without query
/// parameters.
pub(crate) fn authorization(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
) -> Result<String, UploadError> {
    let date = &request.amz_date[..8.min(request.amz_date.len())];
    let scope = format!("{}/{}/{}/aws4_request", date, request.region, SERVICE);

    let mut headers = vec![
        ("host", host_header(request.url)),
        ("x-amz-content-sha256", request.payload_hash.to_string()),
        ("x-amz-date", request.amz_date.to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.expose_secret().to_string()));
    }
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        request.url.path(),
        canonical_headers,
        signed_headers,
        request.payload_hash
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        request.amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(credentials.secret_key.expose_secret(), date, request.region)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        credentials.access_key.expose_secret(),
        scope,
        signed_headers,
        signature
    ))
}

fn signing_key(secret: &str, date: &str, region: &str) -> Result<Vec<u8>, UploadError> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, SERVICE.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, UploadError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| UploadError::Config("Invalid SigV4 signing key".into()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
