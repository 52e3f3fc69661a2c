//! Remote delivery transport.
//!
//! The engine never interprets a mutation's payload or endpoint; it hands the
//! record to a [`RemoteTransport`] and classifies the result. The transport
//! decides what "transient" means for its protocol. For HTTP that is connect
//! failures, timeouts, and server-side conditions worth retrying (408, 429,
//! 5xx); every other non-2xx is a terminal rejection.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::types::{PendingMutation, WriteMethod};

/// Delivery failure, classified for retry policy.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Retryable condition: the mutation stays queued for the next pass
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Permanent rejection: retrying would never succeed
    #[error("rejected by server (status {status:?}): {message}")]
    Terminal {
        /// Protocol status code, when one was received
        status: Option<u16>,
        /// Server-provided rejection detail
        message: String,
    },
}

impl TransportError {
    /// Whether this failure should be retried on a later pass
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

/// Applies a single mutation against the remote service.
///
/// Implementations must be idempotency-friendly: the same mutation (same id)
/// may be delivered more than once across passes.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn apply(&self, mutation: &PendingMutation) -> Result<(), TransportError>;
}

/// Whether an HTTP status code is worth retrying.
fn is_transient_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..=599).contains(&code)
}

/// HTTP transport backed by reqwest.
///
/// The mutation verb maps to the HTTP method, the payload travels as the
/// request body under `Content-Type: <content_kind>`, and the mutation id is
/// sent as an `Idempotency-Key` header so the server can deduplicate
/// redelivered mutations.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport targeting the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn http_method(method: WriteMethod) -> reqwest::Method {
        match method {
            WriteMethod::Post => reqwest::Method::POST,
            WriteMethod::Put => reqwest::Method::PUT,
            WriteMethod::Patch => reqwest::Method::PATCH,
            WriteMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn apply(&self, mutation: &PendingMutation) -> Result<(), TransportError> {
        let url = self.url_for(&mutation.endpoint);
        debug!(id = %mutation.id, method = %mutation.method, %url, "delivering mutation");

        let response = self
            .client
            .request(Self::http_method(mutation.method), &url)
            .header("Content-Type", mutation.content_kind.as_str())
            .header("Idempotency-Key", mutation.id.to_string_repr())
            .body(mutation.payload.clone())
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if is_transient_status(status.as_u16()) {
            Err(TransportError::Transient(format!("HTTP {}", status)))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(TransportError::Terminal {
                status: Some(status.as_u16()),
                message,
            })
        }
    }
}
