use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Periodic flush timer.
///
/// Runs `tick` on its own task with a fixed delay between invocations. The
/// tick callback returns `None` to stop the schedule (the owner is gone).
/// Dropping the scheduler cancels it, so installing a new one in its place
/// stops the previous schedule.
#[derive(Debug)]
pub struct FlushScheduler {
    ct: CancellationToken,
}

impl FlushScheduler {
    /// Start a schedule invoking `tick` every `interval`.
    pub fn start<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let ct = CancellationToken::new();
        let task_ct = ct.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_ct.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let Some(flush) = tick() else {
                            break;
                        };
                        flush.await;
                    }
                }
            }
        });

        Self { ct }
    }

    /// Stop future ticks. Does not wait for an in-flight tick, but no new
    /// tick starts after this returns.
    pub fn cancel(&self) {
        self.ct.cancel();
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}
