//! Remote assist client.
//!
//! Remote assist is an optional, best-effort pass that augments local
//! detections with results from a hosted detection endpoint. It never replaces
//! local results. Failures are classified into [`AssistError`]s; only
//! [`AssistError::Unavailable`] is silently degraded by the pipeline.

mod error;
mod payload;
mod usage;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

pub use error::{
    AssistError, AssistErrorKind, ErrorBody, CODE_INVALID_KEY, CODE_RATE_LIMIT, CODE_TEXT_TOO_LONG,
};
pub use payload::EntityPayload;
pub use usage::{UsageInfo, USAGE_COUNT_HEADER, USAGE_LIMIT_HEADER, USAGE_RESET_HEADER};

use crate::config::AssistConfig;
use crate::text::utf16_len;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Path of the detection endpoint under the base URL.
pub const DETECT_PATH: &str = "/v1/ai-detect";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A successful assist response.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistResponse {
    /// Entities, tagged by body shape.
    pub payload: EntityPayload,
    /// Usage reported in the response headers.
    pub usage: Option<UsageInfo>,
}

/// The remote assist seam.
#[async_trait]
pub trait RemoteAssist: Send + Sync + std::fmt::Debug {
    /// Detect entities in `text` remotely.
    ///
    /// `api_key` is sent only when present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AssistError`].
    async fn detect(
        &self,
        text: &str,
        api_key: Option<&str>,
    ) -> Result<AssistResponse, AssistError>;
}

#[derive(Debug, Serialize)]
struct AssistRequest<'a> {
    text: &'a str,
}

/// HTTP client for the hosted assist endpoint.
#[derive(Debug, Clone)]
pub struct AssistClient {
    http: reqwest::Client,
    base_url: String,
    max_input_chars: usize,
    max_response_bytes: usize,
}

impl AssistClient {
    /// Default cap on input length, in UTF-16 units.
    pub const DEFAULT_MAX_INPUT_CHARS: usize = 500;

    /// Default cap on the size of a response body.
    pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

    /// Create a client for `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            max_input_chars: Self::DEFAULT_MAX_INPUT_CHARS,
            max_response_bytes: Self::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &AssistConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            max_input_chars: config.max_input_chars,
            max_response_bytes: Self::DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Set the input length cap.
    #[must_use]
    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max;
        self
    }

    /// Set the response body cap.
    #[must_use]
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// The base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the detection endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{DETECT_PATH}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RemoteAssist for AssistClient {
    async fn detect(
        &self,
        text: &str,
        api_key: Option<&str>,
    ) -> Result<AssistResponse, AssistError> {
        let len = utf16_len(text);
        if len > self.max_input_chars {
            return Err(AssistError::InputTooLarge {
                message: Some(format!(
                    "{len} characters exceeds the assist limit of {}",
                    self.max_input_chars
                )),
            });
        }

        let start = std::time::Instant::now();
        let mut request = self
            .http
            .post(self.endpoint())
            .json(&AssistRequest { text });
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Assist request failed");
            AssistError::unavailable(e.to_string())
        })?;

        let status = response.status();
        let usage = UsageInfo::from_headers(response.headers());
        let body = read_body(response, self.max_response_bytes).await?;

        if !status.is_success() {
            let err = AssistError::from_response(status.as_u16(), &body);
            warn!(status = %status, kind = ?err.kind(), "Assist API error");
            return Err(err);
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| AssistError::unavailable(format!("invalid response body: {e}")))?;
        let payload = EntityPayload::from_body(&value);
        if payload == EntityPayload::Unrecognized {
            warn!("Assist response has no recognized entity list");
        }

        debug!(
            shape = payload.shape(),
            entities = payload.items().len(),
            duration_ms = start.elapsed().as_millis(),
            "Assist detection"
        );

        Ok(AssistResponse { payload, usage })
    }
}

/// Read a response body of at most `limit` bytes.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<String, AssistError> {
    let too_large = || {
        warn!(limit, "Assist response body too large");
        AssistError::unavailable(format!("response body exceeds {limit} bytes"))
    };

    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AssistError::unavailable(format!("failed to read response: {e}")))?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
