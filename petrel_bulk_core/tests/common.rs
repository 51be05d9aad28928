#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use petrel_bulk_core::{
    Batch, BatchListener, BulkResponse, BulkTransport, ItemOutcome, ItemResult, Operation,
    OperationKind, ProcessorError, TransportError,
};
use tokio::sync::Semaphore;

pub fn indexed_operation(id: &str) -> Operation {
    Operation::index("logs", Bytes::from_static(b"{\"v\":1}")).with_id(id)
}

/// In-memory transport recording every executed batch.
///
/// `hold()` makes calls wait for an explicit [`release`](Self::release), to
/// keep completions open while a test observes in-flight state. `fail_next`
/// makes the next `n` calls report a rejection.
pub struct MockTransport {
    executed: Mutex<Vec<Batch>>,
    hold: Option<Semaphore>,
    fail_next: AtomicUsize,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            hold: None,
            fail_next: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every call open until released.
    pub fn held() -> Self {
        Self {
            hold: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Let `n` held calls complete.
    pub fn release(&self, n: usize) {
        self.hold
            .as_ref()
            .expect("transport was not built with held()")
            .add_permits(n);
    }

    /// Make the next `n` calls fail with a rejection.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<Batch> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_len(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever observed in flight simultaneously.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn response_for(batch: &Batch) -> BulkResponse {
        let items = batch
            .operations()
            .iter()
            .map(|operation| {
                let result = ItemResult {
                    collection: operation.collection().to_string(),
                    id: operation.id().map(str::to_string),
                    status: 200,
                    error: None,
                };
                match operation.kind() {
                    OperationKind::Index => ItemOutcome::Index(result),
                    OperationKind::Create => ItemOutcome::Create(result),
                    OperationKind::Delete => ItemOutcome::Delete(result),
                    OperationKind::Update => ItemOutcome::Update(result),
                }
            })
            .collect();
        BulkResponse {
            took_millis: 1,
            errors: false,
            items,
        }
    }
}

#[async_trait]
impl BulkTransport for MockTransport {
    async fn execute(&self, batch: &Batch) -> Result<BulkResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.acquire()
                .await
                .expect("hold semaphore never closed")
                .forget();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Rejected {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }

        let response = Self::response_for(batch);
        self.executed.lock().unwrap().push(batch.clone());
        Ok(response)
    }
}

/// Listener recording execution ids per callback.
#[derive(Default)]
pub struct CountingListener {
    before: Mutex<Vec<u64>>,
    successes: Mutex<Vec<u64>>,
    failures: Mutex<Vec<u64>>,
}

impl CountingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_ids(&self) -> Vec<u64> {
        self.before.lock().unwrap().clone()
    }

    pub fn success_ids(&self) -> Vec<u64> {
        self.successes.lock().unwrap().clone()
    }

    pub fn failure_ids(&self) -> Vec<u64> {
        self.failures.lock().unwrap().clone()
    }
}

impl BatchListener for CountingListener {
    fn before_batch(&self, execution_id: u64, _batch: &Batch) {
        self.before.lock().unwrap().push(execution_id);
    }

    fn after_batch_success(&self, execution_id: u64, _batch: &Batch, _response: &BulkResponse) {
        self.successes.lock().unwrap().push(execution_id);
    }

    fn after_batch_failure(&self, execution_id: u64, _batch: &Batch, _error: &ProcessorError) {
        self.failures.lock().unwrap().push(execution_id);
    }
}

/// Listener following the disable-on-failure convention: the first batch
/// failure flips `enabled`, and producers consult it before adding more.
pub struct FailStopListener {
    enabled: std::sync::atomic::AtomicBool,
}

impl FailStopListener {
    pub fn new() -> Self {
        Self {
            enabled: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl BatchListener for FailStopListener {
    fn after_batch_failure(&self, _execution_id: u64, _batch: &Batch, _error: &ProcessorError) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// Poll `cond` until it holds or the deadline expires.
pub async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > deadline {
            panic!("condition not met within {deadline:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
