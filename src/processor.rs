//! Batch former: accumulates records under a short lock and hands full or
//! timed-out batches to the configured handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Result;
use crate::receiver::LogRecord;

/// Consumes one batch; invoked with no locks held.
pub trait BatchHandler: Send + Sync {
    fn handle_batch(&self, batch: Vec<LogRecord>) -> Result<()>;
}

struct BatchBuffer {
    records: Vec<LogRecord>,
    last_flush: Instant,
}

pub struct BatchProcessor {
    batch_size: usize,
    batch_timeout: Duration,
    buffer: Mutex<BatchBuffer>,
    handler: Arc<dyn BatchHandler>,
}

impl BatchProcessor {
    pub fn new(batch_size: usize, batch_timeout: Duration, handler: Arc<dyn BatchHandler>) -> Self {
        Self {
            batch_size,
            batch_timeout,
            buffer: Mutex::new(BatchBuffer {
                records: Vec::with_capacity(batch_size),
                last_flush: Instant::now(),
            }),
            handler,
        }
    }

    /// Append one record; emits a batch when the buffer reaches
    /// `batch_size` or the timeout elapsed since the last emission.
    ///
    /// The timeout is only observed here, so a lull after the last record
    /// defers its flush until the next call (or an explicit `flush`).
    pub fn process(&self, record: LogRecord) -> Result<()> {
        let batch = {
            let mut buffer = self.buffer.lock();
            buffer.records.push(record);
            if buffer.records.len() >= self.batch_size
                || buffer.last_flush.elapsed() >= self.batch_timeout
            {
                Some(Self::snapshot(&mut buffer, self.batch_size))
            } else {
                None
            }
        };

        match batch {
            Some(batch) => self.handler.handle_batch(batch),
            None => Ok(()),
        }
    }

    /// Unconditionally emit whatever the buffer holds.
    pub fn flush(&self) -> Result<()> {
        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.records.is_empty() {
                None
            } else {
                Some(Self::snapshot(&mut buffer, self.batch_size))
            }
        };

        match batch {
            Some(batch) => self.handler.handle_batch(batch),
            None => Ok(()),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().records.len()
    }

    fn snapshot(buffer: &mut BatchBuffer, capacity: usize) -> Vec<LogRecord> {
        buffer.last_flush = Instant::now();
        std::mem::replace(&mut buffer.records, Vec::with_capacity(capacity))
    }
}
