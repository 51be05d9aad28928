use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::error::{AdmissionSnafu, Result};

/// Bounded permit pool limiting the number of batches in flight.
///
/// A permit must be held for the whole lifetime of a dispatched batch and is
/// released when the [`AdmissionPermit`] drops, so completion callbacks and
/// panics cannot leak capacity.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

/// A held admission permit. Dropping it returns the permit to the gate.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate admitting at most `max_permits` concurrent batches.
    pub fn new(max_permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
        }
    }

    /// Wait until a permit is available.
    ///
    /// Fails only when the wait is interrupted (gate closed); no permit is
    /// held in that case and the submission must be treated as failed.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AdmissionSnafu {}.build())?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Permits currently available, `0..=max_permits`.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Wait up to `max_wait` for every permit to return, meaning all
    /// in-flight batches completed. Returns whether the gate fully drained.
    pub async fn drain(&self, max_wait: Duration) -> bool {
        let all = self
            .semaphore
            .clone()
            .acquire_many_owned(self.max_permits as u32);
        match timeout(max_wait, all).await {
            Ok(Ok(_permits)) => true,
            _ => false,
        }
    }
}
