use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use bytesize::ByteSize;
use snafu::ResultExt;
use tracing::{debug, trace, warn};

use crate::buffer::BatchBuffer;
use crate::error::{ClosedSnafu, ProcessorError, Result, WireSnafu};
use crate::gate::AdmissionGate;
use crate::listener::BatchListener;
use crate::operation::{Batch, Operation};
use crate::scheduler::FlushScheduler;
use crate::transport::BulkTransport;
use crate::wire::{FramedDefaults, FramedReader};

/// Configuration for a [`BatchProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Flush when this many operations are pending. `0` disables the
    /// count-based trigger.
    pub max_actions_per_batch: usize,
    /// Flush when the pending operations' estimated size reaches this
    /// volume. `0` disables the size-based trigger.
    pub max_bytes_per_batch: ByteSize,
    /// Number of batches allowed in flight at once. `0` selects synchronous
    /// mode: the dispatching task performs the transport call inline.
    pub max_concurrent_batches: usize,
    /// Flush pending operations at this interval regardless of the other
    /// triggers. `None` disables the periodic flush.
    pub flush_interval: Option<Duration>,
}

impl ProcessorOptions {
    pub fn new() -> Self {
        Self {
            max_actions_per_batch: 1000,
            max_bytes_per_batch: ByteSize::mb(10),
            max_concurrent_batches: 4,
            flush_interval: None,
        }
    }

    /// Change the count-based flush trigger.
    pub fn with_max_actions_per_batch(mut self, max_actions_per_batch: usize) -> Self {
        self.max_actions_per_batch = max_actions_per_batch;
        self
    }

    /// Change the size-based flush trigger.
    pub fn with_max_bytes_per_batch(mut self, max_bytes_per_batch: ByteSize) -> Self {
        self.max_bytes_per_batch = max_bytes_per_batch;
        self
    }

    /// Change the number of concurrent in-flight batches.
    pub fn with_max_concurrent_batches(mut self, max_concurrent_batches: usize) -> Self {
        self.max_concurrent_batches = max_concurrent_batches;
        self
    }

    /// Change the periodic flush interval.
    pub fn with_flush_interval(mut self, flush_interval: Option<Duration>) -> Self {
        self.flush_interval = flush_interval;
        self
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self::new()
    }
}

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Accumulates operations and dispatches them as bulk batches.
///
/// Operations are buffered until a configured trigger fires: pending count,
/// pending byte volume, or the periodic flush interval. Extracted batches go
/// through the admission gate, so at most `max_concurrent_batches` transport
/// calls are in flight and producers overrunning the transport suspend in
/// [`add`](Self::add) instead of growing the buffer without bound.
///
/// Handles are cheap to clone and share one processor.
#[derive(Clone)]
pub struct BatchProcessor {
    inner: Arc<ProcessorInner>,
}

struct ProcessorInner {
    buffer: BatchBuffer,
    gate: Option<AdmissionGate>,
    transport: Arc<dyn BulkTransport>,
    listener: Arc<dyn BatchListener>,
    options: ProcessorOptions,
    execution_id: AtomicU64,
    state: AtomicU8,
    /// Serializes threshold evaluation and extraction, so concurrent adders
    /// crossing a trigger can never extract overlapping operations.
    policy_lock: Mutex<()>,
    scheduler: Mutex<Option<FlushScheduler>>,
}

impl BatchProcessor {
    /// Create a processor dispatching through `transport` and notifying
    /// `listener`. The periodic flush starts immediately when configured.
    pub fn new(
        transport: Arc<dyn BulkTransport>,
        listener: Arc<dyn BatchListener>,
        options: ProcessorOptions,
    ) -> Self {
        let gate = match options.max_concurrent_batches {
            0 => None,
            max_permits => Some(AdmissionGate::new(max_permits)),
        };
        let flush_interval = options.flush_interval;

        let processor = Self {
            inner: Arc::new(ProcessorInner {
                buffer: BatchBuffer::new(),
                gate,
                transport,
                listener,
                options,
                execution_id: AtomicU64::new(0),
                state: AtomicU8::new(STATE_OPEN),
                policy_lock: Mutex::new(()),
                scheduler: Mutex::new(None),
            }),
        };
        processor.set_flush_interval(flush_interval);
        processor
    }

    /// Add an operation, flushing any batches whose trigger it crossed.
    ///
    /// Fails once the processor is closed. May suspend on the admission gate
    /// when a flush is triggered while the gate is exhausted.
    pub async fn add(&self, operation: Operation) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.buffer.add(operation);
        for batch in self.inner.extract_over_threshold() {
            ProcessorInner::dispatch(&self.inner, batch).await;
        }
        Ok(())
    }

    /// Parse a framed bulk body, adding each operation in order.
    ///
    /// Returns the number of operations added. A malformed record aborts the
    /// rest of the stream; operations added before it stay buffered.
    pub async fn add_framed(&self, data: Bytes, defaults: &FramedDefaults) -> Result<usize> {
        self.inner.ensure_open()?;
        let mut added = 0;
        for operation in FramedReader::new(data, defaults.clone()) {
            let operation = operation.context(WireSnafu)?;
            self.add(operation).await?;
            added += 1;
        }
        Ok(added)
    }

    /// Dispatch everything currently pending, regardless of thresholds.
    pub async fn flush(&self) -> Result<()> {
        self.inner.ensure_open()?;
        let batch = self.inner.drain_pending();
        ProcessorInner::dispatch(&self.inner, batch).await;
        Ok(())
    }

    /// Close the processor: stop the periodic flush, dispatch the remaining
    /// operations, then wait up to `drain_timeout` for in-flight batches.
    ///
    /// Returns whether every in-flight batch completed within the timeout.
    /// Closing an already closed processor is a no-op reporting `true`.
    pub async fn close(&self, drain_timeout: Duration) -> bool {
        if self
            .inner
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return true;
        }
        debug!("closing batch processor");

        if let Some(scheduler) = self
            .inner
            .scheduler
            .lock()
            .expect("scheduler lock poisoned")
            .take()
        {
            scheduler.cancel();
        }

        let batch = self.inner.drain_pending();
        ProcessorInner::dispatch(&self.inner, batch).await;

        let drained = match &self.inner.gate {
            Some(gate) => gate.drain(drain_timeout).await,
            None => true,
        };
        self.inner.state.store(STATE_CLOSED, Ordering::Release);

        if !drained {
            warn!("batch processor closed with batches still in flight");
        }
        drained
    }

    /// Replace the periodic flush schedule. `None` cancels it.
    ///
    /// Installing a new schedule cancels the previous one; a processor has
    /// at most one active schedule.
    pub fn set_flush_interval(&self, flush_interval: Option<Duration>) {
        let mut slot = self
            .inner
            .scheduler
            .lock()
            .expect("scheduler lock poisoned");
        *slot = flush_interval
            .filter(|interval| !interval.is_zero())
            .map(|interval| {
                let weak = Arc::downgrade(&self.inner);
                FlushScheduler::start(interval, move || {
                    let inner = weak.upgrade()?;
                    Some(flush_on_tick(inner))
                })
            });
    }

    pub fn number_of_actions(&self) -> usize {
        self.inner.buffer.number_of_actions()
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.inner.buffer.estimated_size_in_bytes()
    }

    /// Permits currently available on the admission gate. Equals
    /// `max_concurrent_batches` when nothing is in flight; `None` in
    /// synchronous mode.
    pub fn available_permits(&self) -> Option<usize> {
        self.inner.gate.as_ref().map(AdmissionGate::available_permits)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) != STATE_OPEN
    }
}

impl ProcessorInner {
    fn ensure_open(&self) -> Result<()> {
        if self.state.load(Ordering::Acquire) == STATE_OPEN {
            Ok(())
        } else {
            ClosedSnafu {}.fail()
        }
    }

    fn next_execution_id(&self) -> u64 {
        self.execution_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Evaluate the flush triggers and extract every batch that is due.
    ///
    /// Runs under the policy lock: the size check drains everything at once,
    /// the count check repeats the take so a burst of adds that ran ahead of
    /// the check is split into full batches.
    fn extract_over_threshold(&self) -> Vec<Batch> {
        let _guard = self.policy_lock.lock().expect("policy lock poisoned");
        let mut batches = Vec::new();

        let max_bytes = self.options.max_bytes_per_batch.as_u64();
        if max_bytes > 0 && self.buffer.estimated_size_in_bytes() >= max_bytes {
            trace!(
                bytes = self.buffer.estimated_size_in_bytes(),
                "volume trigger crossed"
            );
            batches.push(self.buffer.take_all());
        } else if self.options.max_actions_per_batch > 0 {
            while self.buffer.number_of_actions() >= self.options.max_actions_per_batch {
                batches.push(self.buffer.take(self.options.max_actions_per_batch));
            }
        }

        batches
    }

    fn drain_pending(&self) -> Batch {
        let _guard = self.policy_lock.lock().expect("policy lock poisoned");
        self.buffer.take_all()
    }

    /// Submit one extracted batch.
    ///
    /// Synchronous mode performs the transport call inline on the calling
    /// task. Otherwise the call runs on its own task holding an admission
    /// permit; the permit guard releases on success, failure and panic
    /// alike.
    async fn dispatch(inner: &Arc<ProcessorInner>, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        let execution_id = inner.next_execution_id();
        debug!(
            execution_id,
            actions = batch.len(),
            bytes = batch.estimated_size_in_bytes(),
            "dispatching bulk batch"
        );

        let Some(gate) = &inner.gate else {
            inner.listener.before_batch(execution_id, &batch);
            match inner.transport.execute(&batch).await {
                Ok(response) => {
                    inner
                        .listener
                        .after_batch_success(execution_id, &batch, &response);
                }
                Err(source) => {
                    warn!(execution_id, error = %source, "bulk batch failed");
                    inner.listener.after_batch_failure(
                        execution_id,
                        &batch,
                        &ProcessorError::Transport { source },
                    );
                }
            }
            return;
        };

        inner.listener.before_batch(execution_id, &batch);
        let permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(error) => {
                warn!(execution_id, "admission interrupted, reporting batch as failed");
                inner
                    .listener
                    .after_batch_failure(execution_id, &batch, &error);
                return;
            }
        };

        let transport = inner.transport.clone();
        let listener = inner.listener.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match transport.execute(&batch).await {
                Ok(response) => listener.after_batch_success(execution_id, &batch, &response),
                Err(source) => {
                    warn!(execution_id, error = %source, "bulk batch failed");
                    listener.after_batch_failure(
                        execution_id,
                        &batch,
                        &ProcessorError::Transport { source },
                    );
                }
            }
        });
    }
}

async fn flush_on_tick(inner: Arc<ProcessorInner>) {
    if inner.state.load(Ordering::Acquire) != STATE_OPEN {
        return;
    }
    let batch = inner.drain_pending();
    if batch.is_empty() {
        return;
    }
    trace!(actions = batch.len(), "interval flush");
    ProcessorInner::dispatch(&inner, batch).await;
}
