use crate::error::ProcessorError;
use crate::operation::Batch;
use crate::transport::BulkResponse;

/// Lifecycle notifications for dispatched batches.
///
/// Callbacks run on whichever task completes the batch, so implementations
/// must be safe to call from arbitrary threads. The engine performs no
/// retries and no failure policy of its own; a listener that wants to stop
/// ingestion after a failure records it and the producer checks that state
/// before adding more operations.
pub trait BatchListener: Send + Sync {
    /// Called before the batch is handed to the transport.
    fn before_batch(&self, _execution_id: u64, _batch: &Batch) {}

    /// Called after the transport accepted the batch. The response may still
    /// report per-item failures via [`BulkResponse::errors`].
    fn after_batch_success(&self, _execution_id: u64, _batch: &Batch, _response: &BulkResponse) {}

    /// Called when the whole batch failed: transport error or a failed
    /// permit acquisition.
    fn after_batch_failure(&self, _execution_id: u64, _batch: &Batch, _error: &ProcessorError) {}
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BatchListener for NoopListener {}
