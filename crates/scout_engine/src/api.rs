use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use scout_core::Category;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiFailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ApiFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for ApiFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailureKind::InvalidUrl => write!(f, "invalid url"),
            ApiFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            ApiFailureKind::Timeout => write!(f, "timeout"),
            ApiFailureKind::Network => write!(f, "network error"),
            ApiFailureKind::Decode => write!(f, "invalid response body"),
        }
    }
}

/// Remote work-distribution contract. The server is the only arbiter of
/// which worker holds which category.
#[async_trait::async_trait]
pub trait ScoutApi: Send + Sync {
    /// Locks the next free category for `device_id`; `None` when the server
    /// has nothing left.
    async fn lock_next(&self, device_id: &str) -> Result<Option<Category>, ApiError>;

    async fn unlock(&self, category_id: &str, device_id: &str) -> Result<(), ApiError>;

    async fn report_error(&self, _site: &str, _report: &ErrorReport) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Body of `POST /property/<site>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub url: String,
    pub device_id: String,
    pub data: serde_json::Value,
}

/// Diagnostic sent to `POST /error/<site>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub time: DateTime<Utc>,
    pub context: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    data: &'a ErrorReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockRequest<'a> {
    category_id: &'a str,
    device_id: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(ApiFailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiFailureKind::Network, err.to_string()))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|err| ApiError::new(ApiFailureKind::InvalidUrl, err.to_string()))
    }

    /// Submits one extracted property. Returns the server's `success` field.
    pub async fn submit_property(
        &self,
        site: &str,
        record: &PropertyRecord,
    ) -> Result<bool, ApiError> {
        let url = self.endpoint(&format!("property/{site}"))?;
        let response = self
            .client
            .post(url)
            .json(record)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response)?;
        let body: Envelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|err| ApiError::new(ApiFailureKind::Decode, err.to_string()))?;
        Ok(body.success)
    }
}

#[async_trait::async_trait]
impl ScoutApi for ApiClient {
    async fn lock_next(&self, device_id: &str) -> Result<Option<Category>, ApiError> {
        let mut url = self.endpoint("category/next")?;
        url.query_pairs_mut().append_pair("deviceId", device_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response)?;
        let body: Envelope<Category> = response
            .json()
            .await
            .map_err(|err| ApiError::new(ApiFailureKind::Decode, err.to_string()))?;

        Ok(if body.success { body.data } else { None })
    }

    async fn unlock(&self, category_id: &str, device_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint("category/unlock")?;
        let response = self
            .client
            .post(url)
            .json(&UnlockRequest {
                category_id,
                device_id,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response)?;
        Ok(())
    }

    async fn report_error(&self, site: &str, report: &ErrorReport) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("error/{site}"))?;
        let response = self
            .client
            .post(url)
            .json(&ErrorEnvelope { data: report })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response)?;
        Ok(())
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::new(
            ApiFailureKind::HttpStatus(status.as_u16()),
            format!("Failed with status {}", status.as_u16()),
        ))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiFailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(ApiFailureKind::Decode, err.to_string());
    }
    ApiError::new(ApiFailureKind::Network, err.to_string())
}
