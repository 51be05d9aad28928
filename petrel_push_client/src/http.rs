//! HTTP client executing bulk batches against the store.

use std::sync::Arc;

use async_trait::async_trait;
use petrel_bulk_core::wire::encode_batch;
use petrel_bulk_core::{Batch, BulkResponse, BulkTransport, TransportError};
use serde::Deserialize;
use tracing::debug;

const CONTENT_TYPE_NDJSON: &str = "application/x-ndjson";

/// A bulk transport pushing batches to the store over HTTP.
///
/// Construct one per target cluster and hand it to the processor; the
/// underlying connection pool is owned by this value, nothing is shared
/// process-wide.
#[derive(Debug, Clone)]
pub struct HttpBulkTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

impl HttpBulkTransport {
    /// Create a transport for the store reachable at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a transport with a preconfigured client (timeouts, TLS,
    /// proxies).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.base_url)
    }
}

#[async_trait]
impl BulkTransport for HttpBulkTransport {
    async fn execute(&self, batch: &Batch) -> Result<BulkResponse, TransportError> {
        let body = encode_batch(batch).map_err(|err| TransportError::Request {
            message: "failed to encode bulk body".to_string(),
            source: Arc::new(err),
        })?;

        debug!(
            actions = batch.len(),
            bytes = body.len(),
            "sending bulk request"
        );

        let response = self
            .client
            .post(self.bulk_url())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_NDJSON)
            .body(body)
            .send()
            .await
            .map_err(|err| TransportError::Request {
                message: "failed to send bulk request".to_string(),
                source: Arc::new(err),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<BulkResponse>()
            .await
            .map_err(|err| TransportError::Request {
                message: "failed to decode bulk response".to_string(),
                source: Arc::new(err),
            })
    }
}
