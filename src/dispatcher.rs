//! Dispatchers: fan records out of the shared receive queue into the
//! worker pool with fail-fast backpressure.

use std::sync::Arc;

use async_channel::Receiver;
use tracing::{debug, warn};

use crate::error::MuninnError;
use crate::metrics::PipelineMetrics;
use crate::receiver::LogRecord;
use crate::worker_pool::WorkerPool;

/// One dispatcher task. Exits when the queue closes (all receiver tasks
/// stopped) or when the pool shuts down underneath it.
pub async fn run_dispatcher(
    id: usize,
    queue: Receiver<LogRecord>,
    pool: Arc<WorkerPool>,
    metrics: Arc<PipelineMetrics>,
) {
    debug!("dispatcher {} started", id);

    while let Ok(record) = queue.recv().await {
        match pool.submit_with_backpressure(record).await {
            Ok(()) => {}
            Err(MuninnError::QueueOverloaded) | Err(MuninnError::SubmitFailed) => {
                // Overload: discard the record, never block the receiver
                metrics.inc_dispatch_rejected();
            }
            Err(MuninnError::PoolClosed) => {
                metrics.inc_dispatch_rejected();
                warn!("dispatcher {} dropped a record in flight during shutdown", id);
                break;
            }
            Err(e) => {
                metrics.inc_dispatch_rejected();
                warn!("dispatcher {} failed to submit: {}", id, e);
            }
        }
    }

    debug!("dispatcher {} exited", id);
}
