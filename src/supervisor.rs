//! Supervisor: owns component lifetimes, runs the tuning/stats ticker and
//! coordinates graceful shutdown.
//!
//! Startup order is leaves-first: patterns compile fatally, the parser and
//! processor are built, the pool is created, listeners bind (bind failure
//! is a startup failure), then dispatchers and the ticker start.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{SyslogConfig, cpu_count};
use crate::dispatcher::run_dispatcher;
use crate::error::{MuninnError, Result};
use crate::handler::ParseHandler;
use crate::http_server::HttpServer;
use crate::metrics::PipelineMetrics;
use crate::parse::Parser;
use crate::processor::BatchProcessor;
use crate::receiver::SyslogReceiver;
use crate::sink::EventSink;
use crate::worker_pool::WorkerPool;

/// Interval of the tuning/stats ticker.
const STATS_INTERVAL: Duration = Duration::from_secs(3);

pub struct Supervisor {
    metrics: Arc<PipelineMetrics>,
    pool: Arc<WorkerPool>,
    processor: Arc<BatchProcessor>,
    cancel: CancellationToken,
    pool_cancel: CancellationToken,
    receiver_handles: Vec<JoinHandle<()>>,
    dispatcher_handles: Vec<JoinHandle<()>>,
    ticker_handle: JoinHandle<()>,
    udp_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor").finish()
    }
}

impl Supervisor {
    /// Wire and start the whole pipeline. Returns once every component is
    /// running; fails on bad configuration or when nothing could bind.
    pub async fn start(config: SyslogConfig, sink: Option<Arc<dyn EventSink>>) -> Result<Self> {
        config.validate()?;

        let regexps = compile_patterns(&config.regexps)?;
        let zone: Tz = config
            .time_location
            .parse()
            .map_err(|_| MuninnError::InvalidTimeZone(config.time_location.clone()))?;
        let parser = Parser::new(zone, config.time_layout.clone());

        let metrics = Arc::new(PipelineMetrics::new()?);
        let handler = Arc::new(ParseHandler::new(
            parser,
            Arc::new(regexps),
            metrics.clone(),
            sink,
        ));
        let processor = Arc::new(BatchProcessor::new(
            config.batch_size,
            config.batch_timeout,
            handler,
        ));

        // The pool gets its own token: during shutdown the receivers stop
        // first and the dispatchers drain the queue into the still-open
        // pool before it is closed
        let cancel = CancellationToken::new();
        let pool_cancel = CancellationToken::new();
        let workers = config.effective_workers();
        let pool = Arc::new(WorkerPool::new(
            workers,
            processor.clone(),
            metrics.clone(),
            pool_cancel.clone(),
        ));
        info!(
            "worker pool created: capacity={} (bounds {}..{})",
            pool.capacity(),
            pool.min_capacity(),
            pool.max_capacity()
        );

        let (tx, rx) = async_channel::bounded(config.queue_capacity);
        let receiver =
            SyslogReceiver::bind(&config, tx, metrics.clone(), cancel.clone()).await?;
        let udp_addr = receiver.udp_addr();
        let tcp_addr = receiver.tcp_addr();
        let receiver_handles = receiver.spawn();

        let dispatchers = cpu_count();
        info!("starting {} dispatchers", dispatchers);
        let dispatcher_handles = (0..dispatchers)
            .map(|id| {
                tokio::spawn(run_dispatcher(
                    id,
                    rx.clone(),
                    pool.clone(),
                    metrics.clone(),
                ))
            })
            .collect();
        drop(rx);

        let ticker_handle = tokio::spawn(run_stats_ticker(
            pool.clone(),
            metrics.clone(),
            cancel.clone(),
        ));

        if let Some(http_addr) = config.http_bind_addr {
            let server = HttpServer::new(metrics.clone(), http_addr);
            let http_cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = server.start(http_cancel).await {
                    error!("diagnostics HTTP server failed: {}", e);
                }
            });
        }

        Ok(Self {
            metrics,
            pool,
            processor,
            cancel,
            pool_cancel,
            receiver_handles,
            dispatcher_handles,
            ticker_handle,
            udp_addr,
            tcp_addr,
        })
    }

    /// Actual UDP listen address, useful when binding to port 0.
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    pub fn pool(&self) -> Arc<WorkerPool> {
        self.pool.clone()
    }

    /// Drain and stop everything: receivers first (the queue closes when
    /// they stop), then dispatchers, then the pool, then a final flush.
    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down: stopping receivers");
        self.cancel.cancel();
        for handle in self.receiver_handles {
            let _ = handle.await;
        }

        info!("waiting for dispatchers to drain the queue");
        for handle in self.dispatcher_handles {
            let _ = handle.await;
        }

        info!("stopping worker pool");
        self.pool_cancel.cancel();
        self.pool.shutdown().await;
        let _ = self.ticker_handle.await;

        self.processor.flush()?;

        info!(
            "pipeline stopped: total processed {}, errors {}",
            self.pool.total_submitted(),
            self.pool.errors()
        );
        Ok(())
    }
}

/// Compile the configured patterns; any bad pattern is fatal at startup.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| MuninnError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Every 3 seconds: self-tune the pool and log throughput since the last
/// tick. Exits when the shutdown token fires.
async fn run_stats_ticker(
    pool: Arc<WorkerPool>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_count = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                pool.adjust_capacity();
                let status = pool.status();
                metrics.set_pool_status(status.capacity, status.running, status.waiting);

                let current = pool.total_submitted();
                info!(
                    "processed total: {}, last 3s: {}, errors: {}, {}",
                    current,
                    current - last_count,
                    pool.errors(),
                    status
                );
                last_count = current;
            }
        }
    }
}

/// Block until SIGINT or SIGTERM.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt");
    }
}
