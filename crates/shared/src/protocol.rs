use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const PROCESS_LIDAR_PATH: &str = "/process_lidar";
pub const UPLOAD_FIELD_NAME: &str = "file";

const MAX_DETAIL_CHARS: usize = 200;

/// Pre-formatted confidence as returned by the service, e.g. `"97.3%"`.
///
/// Kept opaque: it is displayed verbatim and also drives the indicator width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(String);

impl Confidence {
    pub fn new(formatted: impl Into<String>) -> Self {
        Self(formatted.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub filename: String,
    pub original_points: u64,
    pub processed_points: u64,
    #[serde(deserialize_with = "deserialize_latency_ms")]
    pub processing_latency_ms: f64,
    pub prediction: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseDecodeError {
    #[error("{0}")]
    ServiceReported(String),
    #[error("malformed scan response: {0}")]
    Malformed(String),
}

/// Decodes a success-status body from `POST /process_lidar`.
///
/// The service reports internal failures as `{"error": "..."}` with a 2xx
/// status; those come back as `ServiceReported`.
pub fn decode_scan_response(body: &[u8]) -> Result<ScanResult, ResponseDecodeError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| ResponseDecodeError::Malformed(err.to_string()))?;

    if let Some(reported) = value.get("error") {
        let message = match reported.as_str() {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => "inference service reported an unspecified error".to_string(),
        };
        return Err(ResponseDecodeError::ServiceReported(message));
    }

    serde_json::from_value(value).map_err(|err| ResponseDecodeError::Malformed(err.to_string()))
}

/// Best-effort human-readable detail from a non-success response body.
pub fn error_detail(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(truncate_detail(text));
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate_detail(trimmed))
    }
}

fn truncate_detail(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    short.push('…');
    short
}

fn deserialize_latency_ms<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLatency {
        Number(f64),
        Text(String),
    }

    match RawLatency::deserialize(deserializer)? {
        RawLatency::Number(ms) => Ok(ms),
        RawLatency::Text(text) => parse_latency_text(&text).ok_or_else(|| {
            de::Error::custom(format!("invalid processing_latency_ms value {text:?}"))
        }),
    }
}

// Accepts "42", "12.34 ms" and "12.34ms".
fn parse_latency_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix("ms").unwrap_or(trimmed).trim_end();
    number.parse::<f64>().ok().filter(|ms| ms.is_finite())
}
