//! Alibaba Cloud OCR client.
//!
//! Calls the `RecognizeAllText` action of the OCR API (version 2021-07-07).
//! Requests are signed with the ACS3-HMAC-SHA256 scheme: a canonical request
//! is hashed, the hash is signed with the access key secret, and the result
//! goes in the `Authorization` header along with the signed header names.

use crate::backend::{ImageSource, OcrBackend, Transcription};
use crate::error::OcrError;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use ulid::Ulid;

const ACTION: &str = "RecognizeAllText";
const VERSION: &str = "2021-07-07";
const ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// Configuration for the OCR service.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Access key ID.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// API host.
    /// Default: "ocr-api.cn-hangzhou.aliyuncs.com"
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Recognition type passed as `Type`.
    /// Default: "General"
    #[serde(default = "default_recognize_type")]
    pub recognize_type: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "ocr-api.cn-hangzhou.aliyuncs.com".to_string()
}

fn default_recognize_type() -> String {
    "General".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("recognize_type", &self.recognize_type)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl OcrConfig {
    /// Creates a new configuration with defaults for optional fields.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            endpoint: default_endpoint(),
            recognize_type: default_recognize_type(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// A request ready to send: URL, headers and body.
#[derive(Debug, Clone)]
pub(crate) struct SignedRequest {
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

/// Client for the Alibaba Cloud OCR API.
#[derive(Debug, Clone)]
pub struct AliyunOcrClient {
    client: reqwest::Client,
    config: OcrConfig,
}

impl AliyunOcrClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if credentials are empty or the HTTP client
    /// cannot be built.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        if config.access_key_id.is_empty() || config.access_key_secret.is_empty() {
            return Err(OcrError::InvalidConfig {
                reason: "access key id and secret are required".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| OcrError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn query(&self, source: &ImageSource) -> Vec<(String, String)> {
        let mut query = vec![
            ("Type".to_string(), self.config.recognize_type.clone()),
            ("OutputFigure".to_string(), "true".to_string()),
            ("OutputCoordinate".to_string(), "points".to_string()),
        ];
        if let ImageSource::Url(url) = source {
            query.push(("Url".to_string(), url.clone()));
        }
        query
    }

    pub(crate) fn build_request(
        &self,
        source: ImageSource,
        date: &str,
        nonce: &str,
    ) -> Result<SignedRequest, OcrError> {
        let query = canonical_query(&self.query(&source));
        let (body, content_type) = match source {
            ImageSource::Url(_) => (Vec::new(), None),
            ImageSource::Bytes(bytes) => (bytes, Some("application/octet-stream")),
        };

        let mut headers = vec![
            ("host".to_string(), self.config.endpoint.clone()),
            ("x-acs-action".to_string(), ACTION.to_string()),
            ("x-acs-content-sha256".to_string(), sha256_hex(&body)),
            ("x-acs-date".to_string(), date.to_string()),
            ("x-acs-signature-nonce".to_string(), nonce.to_string()),
            ("x-acs-version".to_string(), VERSION.to_string()),
        ];
        if let Some(content_type) = content_type {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
        headers.sort();

        let authorization = authorization(
            &self.config.access_key_id,
            &self.config.access_key_secret,
            "POST",
            &query,
            &headers,
            &body,
        )?;
        headers.push(("authorization".to_string(), authorization));

        Ok(SignedRequest {
            url: format!("https://{}/?{query}", self.config.endpoint),
            headers,
            body,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceResponse {
    request_id: Option<String>,
    data: Option<JsonValue>,
    code: Option<String>,
    message: Option<String>,
    recommend: Option<String>,
}

impl ServiceResponse {
    fn into_transcription(self, status: u16) -> Result<Transcription, OcrError> {
        if let Some(code) = self.code {
            return Err(OcrError::Service {
                status,
                code,
                message: self.message.unwrap_or_default(),
                recommend: self.recommend,
            });
        }
        let text = match self.data {
            Some(JsonValue::String(text)) => text,
            Some(other) => other.to_string(),
            None => {
                return Err(OcrError::ResponseParseFailed {
                    reason: "response has no Data".to_string(),
                });
            }
        };
        Ok(Transcription {
            request_id: self.request_id,
            text,
        })
    }
}

#[async_trait]
impl OcrBackend for AliyunOcrClient {
    #[instrument(skip_all, fields(endpoint = %self.config.endpoint, source = ?source))]
    async fn recognize(&self, source: ImageSource) -> Result<Transcription, OcrError> {
        let started = Instant::now();
        let date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = Ulid::new().to_string();
        let signed = self.build_request(source, &date, &nonce)?;

        let mut request = self.client.post(&signed.url);
        for (name, value) in &signed.headers {
            // reqwest derives host from the URL.
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        let response = request
            .body(signed.body)
            .send()
            .await
            .map_err(|e| OcrError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let raw = response.text().await.map_err(|e| OcrError::RequestFailed {
            reason: e.to_string(),
        })?;
        let parsed: ServiceResponse =
            serde_json::from_str(&raw).map_err(|e| OcrError::ResponseParseFailed {
                reason: format!("{e} (status {status})"),
            })?;

        let result = parsed.into_transcription(status);
        match &result {
            Ok(transcription) => debug!(
                latency_ms = started.elapsed().as_millis() as u64,
                request_id = ?transcription.request_id,
                "OCR finished"
            ),
            Err(error) => warn!(%error, "OCR service rejected the request"),
        }
        result
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Builds the canonical query string: RFC 3986 encoded pairs sorted by key.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Computes the `Authorization` header value.
///
/// `headers` must be lowercase and sorted by name.
fn authorization(
    access_key_id: &str,
    access_key_secret: &str,
    method: &str,
    canonical_query: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<String, OcrError> {
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_request = format!(
        "{method}\n/\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(body)
    );
    let string_to_sign = format!("{ALGORITHM}\n{}", sha256_hex(canonical_request.as_bytes()));

    let mut mac = Hmac::<Sha256>::new_from_slice(access_key_secret.as_bytes()).map_err(|e| {
        OcrError::InvalidConfig {
            reason: format!("unusable access key secret: {e}"),
        }
    })?;
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!(
        "{ALGORITHM} Credential={access_key_id},SignedHeaders={signed_headers},Signature={signature}"
    ))
}
