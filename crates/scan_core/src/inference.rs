//! Inference service seam: the `POST /process_lidar` contract and its HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use shared::{
    protocol::{
        decode_scan_response, error_detail, ResponseDecodeError, PROCESS_LIDAR_PATH,
        UPLOAD_FIELD_NAME,
    },
    ScanError, ScanErrorKind, ScanResult,
};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Binary payload plus its name, owned for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub filename: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("could not reach the inference service at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("inference service did not answer within {}s", .timeout.as_secs_f32())]
    TimedOut { timeout: Duration },
    #[error("inference service returned HTTP {status}: {detail}")]
    Service { status: u16, detail: String },
    #[error("inference service response did not match the expected shape: {reason}")]
    Decode { reason: String },
    #[error("could not read {filename}: {reason}")]
    Unreadable { filename: String, reason: String },
}

impl From<InferenceError> for ScanError {
    fn from(value: InferenceError) -> Self {
        match value {
            InferenceError::Unreachable { .. } => ScanError::new(
                ScanErrorKind::Transport,
                "Could not reach the inference service. Ensure the backend is running.",
            ),
            InferenceError::TimedOut { timeout } => ScanError::new(
                ScanErrorKind::Transport,
                format!(
                    "Could not reach the inference service: no answer within {}s.",
                    timeout.as_secs_f32()
                ),
            ),
            InferenceError::Service { detail, .. } => ScanError::new(
                ScanErrorKind::Service,
                format!("Inference service returned an error: {detail}"),
            ),
            // Same wording as a service error; the kind keeps them apart in logs.
            InferenceError::Decode { .. } => ScanError::new(
                ScanErrorKind::Decode,
                "Inference service returned an error: unexpected response.",
            ),
            InferenceError::Unreadable { filename, reason } => ScanError::new(
                ScanErrorKind::Unreadable,
                format!("Could not read {filename}: {reason}"),
            ),
        }
    }
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn process_lidar(&self, request: UploadRequest) -> Result<ScanResult, InferenceError>;
}

pub struct HttpInferenceClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInferenceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, InferenceError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InferenceError::Unreachable {
                endpoint: base_url.clone(),
                reason: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{PROCESS_LIDAR_PATH}", self.base_url)
    }

    fn classify_send_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::TimedOut {
                timeout: self.timeout,
            }
        } else {
            InferenceError::Unreachable {
                endpoint: self.endpoint(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl InferenceService for HttpInferenceClient {
    async fn process_lidar(&self, request: UploadRequest) -> Result<ScanResult, InferenceError> {
        let endpoint = self.endpoint();
        let size_bytes = request.payload.len();
        let part = Part::bytes(request.payload).file_name(request.filename.clone());
        let form = Form::new().part(UPLOAD_FIELD_NAME, part);

        debug!(%endpoint, filename = %request.filename, size_bytes, "posting point cloud");
        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                let err = self.classify_send_error(err);
                error!(%endpoint, error = %err, "inference request failed in transport");
                err
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.classify_send_error(err))?;

        if !status.is_success() {
            let detail = error_detail(&String::from_utf8_lossy(&body))
                .unwrap_or_else(|| generic_status_detail(status));
            warn!(%endpoint, status = status.as_u16(), %detail, "inference service returned failure status");
            return Err(InferenceError::Service {
                status: status.as_u16(),
                detail,
            });
        }

        decode_scan_response(&body).map_err(|err| match err {
            ResponseDecodeError::ServiceReported(detail) => {
                warn!(%endpoint, %detail, "inference service reported an error in a success body");
                InferenceError::Service {
                    status: status.as_u16(),
                    detail,
                }
            }
            ResponseDecodeError::Malformed(reason) => {
                warn!(%endpoint, %reason, "inference response did not match expected shape");
                InferenceError::Decode { reason }
            }
        })
    }
}

fn generic_status_detail(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("no detail provided")
        .to_string()
}

#[cfg(test)]
#[path = "tests/inference_tests.rs"]
mod tests;
