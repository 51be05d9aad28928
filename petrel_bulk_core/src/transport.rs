use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::operation::Batch;

/// The service boundary that performs a bulk write against the store.
///
/// The engine depends only on this contract; the wire protocol, auth and
/// cluster topology behind it are the implementation's concern. Each call is
/// an independent unit of work with its own outcome.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn execute(&self, batch: &Batch) -> Result<BulkResponse, TransportError>;
}

/// Errors reported by a [`BulkTransport`] implementation.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    /// The request could not be performed.
    #[snafu(display("bulk request failed: {message}"))]
    Request {
        message: String,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// The endpoint answered with a non-success status.
    #[snafu(display("bulk endpoint rejected the request: status={status} {message}"))]
    Rejected { status: u16, message: String },
}

/// Aggregate response to a bulk call.
///
/// `errors` is set when any item failed; the engine passes the response
/// through untouched, per-item inspection is the listener's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(rename = "took")]
    pub took_millis: u64,
    pub errors: bool,
    pub items: Vec<ItemOutcome>,
}

/// Outcome of a single operation within a bulk response, keyed by the
/// operation kind the way the wire convention frames it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Index(ItemResult),
    Create(ItemResult),
    Delete(ItemResult),
    Update(ItemResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(rename = "_index")]
    pub collection: String,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn result(&self) -> &ItemResult {
        match self {
            ItemOutcome::Index(result)
            | ItemOutcome::Create(result)
            | ItemOutcome::Delete(result)
            | ItemOutcome::Update(result) => result,
        }
    }

    /// Whether the store applied this item.
    pub fn is_success(&self) -> bool {
        let status = self.result().status;
        (200..300).contains(&status)
    }
}
