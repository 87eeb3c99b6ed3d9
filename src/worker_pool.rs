//! Elastic worker pool with queue-length admission control.
//!
//! Admission is a semaphore whose issued permits always equal the pool
//! capacity. Growing adds permits; shrinking forgets idle permits, so the
//! observable capacity only drops by what was actually reclaimed. Each
//! admitted record runs as one task; a task failure (including a panic)
//! is counted and isolated, never taking the pool down.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::cpu_count;
use crate::error::{MuninnError, Result};
use crate::metrics::PipelineMetrics;
use crate::processor::BatchProcessor;
use crate::receiver::LogRecord;

/// Most submissions allowed to wait for a permit before `submit` fails.
const MAX_WAITING: usize = 50_000;

/// Load ratio above which the pool grows.
const GROW_THRESHOLD: f64 = 0.7;
/// Load ratio below which the pool may shrink.
const SHRINK_THRESHOLD: f64 = 0.15;
/// Shrinking also requires fewer than this many waiters.
const SHRINK_MAX_WAITING: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub capacity: usize,
    pub running: usize,
    pub waiting: usize,
    pub idle: usize,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cap: {}, running: {}, waiting: {}, idle: {}",
            self.capacity, self.running, self.waiting, self.idle
        )
    }
}

struct PoolShared {
    semaphore: Arc<Semaphore>,
    capacity: AtomicUsize,
    running: AtomicUsize,
    waiting: AtomicUsize,
    total_submitted: AtomicU64,
    errors: AtomicU64,
    closed: AtomicBool,
    drained: Notify,
    processor: Arc<BatchProcessor>,
    metrics: Arc<PipelineMetrics>,
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    min_capacity: usize,
    max_capacity: usize,
    max_waiting: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        workers: usize,
        processor: Arc<BatchProcessor>,
        metrics: Arc<PipelineMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        let cpus = cpu_count();
        let min_capacity = cpus * 2;
        let max_capacity = cpus * 600;
        let capacity = workers.clamp(min_capacity, max_capacity);

        Self {
            shared: Arc::new(PoolShared {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity: AtomicUsize::new(capacity),
                running: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
                total_submitted: AtomicU64::new(0),
                errors: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                drained: Notify::new(),
                processor,
                metrics,
            }),
            min_capacity,
            max_capacity,
            max_waiting: MAX_WAITING,
            cancel,
        }
    }

    /// Enqueue one record. Blocks while capacity is exhausted; fails with
    /// `SubmitFailed` once too many submissions are already waiting.
    pub async fn submit(&self, record: LogRecord) -> Result<()> {
        if self.is_closed() {
            return Err(MuninnError::PoolClosed);
        }
        if self.shared.waiting.load(Ordering::Acquire) > self.max_waiting {
            return Err(MuninnError::SubmitFailed);
        }

        self.shared.waiting.fetch_add(1, Ordering::AcqRel);
        let permit = self.shared.semaphore.clone().acquire_owned().await;
        self.shared.waiting.fetch_sub(1, Ordering::AcqRel);

        let permit = match permit {
            Ok(permit) => permit,
            Err(_) => return Err(MuninnError::PoolClosed),
        };
        if self.is_closed() {
            return Err(MuninnError::PoolClosed);
        }

        self.shared.running.fetch_add(1, Ordering::AcqRel);
        self.shared.total_submitted.fetch_add(1, Ordering::Relaxed);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| shared.processor.process(record)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    shared.errors.fetch_add(1, Ordering::Relaxed);
                    shared.metrics.inc_process_error();
                    warn!("record processing failed: {}", e);
                }
                Err(_) => {
                    shared.errors.fetch_add(1, Ordering::Relaxed);
                    shared.metrics.inc_process_error();
                    error!("worker task panicked; worker recovered");
                }
            }
            if shared.running.fetch_sub(1, Ordering::AcqRel) == 1 {
                shared.drained.notify_waiters();
            }
        });

        Ok(())
    }

    /// Fail-fast admission: rejects immediately while the waiting queue
    /// holds more than 80% of capacity.
    pub async fn submit_with_backpressure(&self, record: LogRecord) -> Result<()> {
        let capacity = self.shared.capacity.load(Ordering::Acquire);
        if self.shared.waiting.load(Ordering::Acquire) > capacity * 8 / 10 {
            return Err(MuninnError::QueueOverloaded);
        }
        self.submit(record).await
    }

    /// Periodic self-tune: grow aggressively above 70% load, shrink
    /// conservatively below 15% load with a near-empty waiting queue.
    pub fn adjust_capacity(&self) {
        let capacity = self.shared.capacity.load(Ordering::Acquire);
        if capacity == 0 {
            return;
        }
        let running = self.shared.running.load(Ordering::Acquire);
        let waiting = self.shared.waiting.load(Ordering::Acquire);
        let load = (running + waiting) as f64 / capacity as f64;

        if load > GROW_THRESHOLD {
            let target = if waiting > capacity {
                capacity.saturating_mul(2)
            } else {
                capacity + capacity / 2
            };
            let target = target.min(self.max_capacity);
            if target > capacity {
                self.shared.semaphore.add_permits(target - capacity);
                self.shared.capacity.store(target, Ordering::Release);
            }
        } else if load < SHRINK_THRESHOLD && waiting < SHRINK_MAX_WAITING {
            let target = (capacity - capacity / 4).max(self.min_capacity);
            if target < capacity {
                // Only idle permits can be reclaimed right now
                let reclaimed = self.shared.semaphore.forget_permits(capacity - target);
                self.shared
                    .capacity
                    .store(capacity - reclaimed, Ordering::Release);
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let capacity = self.shared.capacity.load(Ordering::Acquire);
        let running = self.shared.running.load(Ordering::Acquire);
        PoolStatus {
            capacity,
            running,
            waiting: self.shared.waiting.load(Ordering::Acquire),
            idle: capacity.saturating_sub(running),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity.load(Ordering::Acquire)
    }

    pub fn total_submitted(&self) -> u64 {
        self.shared.total_submitted.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.shared.errors.load(Ordering::Relaxed)
    }

    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Inject observed load so tuning decisions can be tested without
    /// timing-sensitive task scheduling.
    #[cfg(test)]
    fn set_load(&self, running: usize, waiting: usize) {
        self.shared.running.store(running, Ordering::Release);
        self.shared.waiting.store(waiting, Ordering::Release);
    }

    /// Stop accepting submissions and wait for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.semaphore.close();

        while self.shared.running.load(Ordering::Acquire) > 0 {
            let notified = self.shared.drained.notified();
            if self.shared.running.load(Ordering::Acquire) == 0 {
                break;
            }
            notified.await;
        }
    }
}
