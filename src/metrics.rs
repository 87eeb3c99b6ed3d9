use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder, opts};

/// Reason a received record was dropped instead of producing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Record slot was empty (kept for metric compatibility; unreachable
    /// with typed records)
    Nil,
    /// No configured pattern matched the body
    NotMatch,
    /// The pattern list is empty
    RuleEmpty,
    /// No downstream sink is wired
    ServerNil,
    /// Receive queue was full (UDP only)
    QueueFull,
    /// A pattern matched but field validation failed
    ParseError,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Nil => "nil",
            DropReason::NotMatch => "not_match",
            DropReason::RuleEmpty => "rule_is_empty",
            DropReason::ServerNil => "server_nil",
            DropReason::QueueFull => "queue_full",
            DropReason::ParseError => "parse_error",
        }
    }
}

/// Prometheus registry and collectors for the ingestion pipeline.
///
/// Every component receives this behind an `Arc`, and each instance owns
/// its own registry so tests can assert counter values in isolation.
pub struct PipelineMetrics {
    registry: Registry,

    events_total: IntCounterVec,
    drop_total: IntCounterVec,

    receiver_errors: IntCounter,
    dispatch_rejected: IntCounter,
    process_errors: IntCounter,

    pool_capacity: IntGauge,
    pool_running: IntGauge,
    pool_waiting: IntGauge,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            opts!("syslog_total", "Total DNS events parsed out of syslog"),
            &["type"],
        )?;

        let drop_total = IntCounterVec::new(
            opts!("syslog_drop_total", "Total syslog records dropped"),
            &["type"],
        )?;

        let receiver_errors = IntCounter::with_opts(opts!(
            "muninn_receiver_errors_total",
            "Transient receive errors on the syslog sockets"
        ))?;

        let dispatch_rejected = IntCounter::with_opts(opts!(
            "muninn_dispatch_rejected_total",
            "Records rejected by worker pool admission control"
        ))?;

        let process_errors = IntCounter::with_opts(opts!(
            "muninn_process_errors_total",
            "Worker tasks that failed or terminated abnormally"
        ))?;

        let pool_capacity = IntGauge::with_opts(opts!(
            "muninn_pool_capacity",
            "Current worker pool capacity"
        ))?;

        let pool_running = IntGauge::with_opts(opts!(
            "muninn_pool_running",
            "Worker tasks currently executing"
        ))?;

        let pool_waiting = IntGauge::with_opts(opts!(
            "muninn_pool_waiting",
            "Submissions waiting for a pool permit"
        ))?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(drop_total.clone()))?;
        registry.register(Box::new(receiver_errors.clone()))?;
        registry.register(Box::new(dispatch_rejected.clone()))?;
        registry.register(Box::new(process_errors.clone()))?;
        registry.register(Box::new(pool_capacity.clone()))?;
        registry.register(Box::new(pool_running.clone()))?;
        registry.register(Box::new(pool_waiting.clone()))?;

        Ok(Self {
            registry,
            events_total,
            drop_total,
            receiver_errors,
            dispatch_rejected,
            process_errors,
            pool_capacity,
            pool_running,
            pool_waiting,
        })
    }

    /// Record one successfully parsed event, labeled by syslog tag.
    pub fn record_event(&self, tag: &str) {
        self.events_total.with_label_values(&[tag]).inc();
    }

    pub fn record_drop(&self, reason: DropReason) {
        self.drop_total.with_label_values(&[reason.as_str()]).inc();
    }

    pub fn inc_receiver_error(&self) {
        self.receiver_errors.inc();
    }

    pub fn inc_dispatch_rejected(&self) {
        self.dispatch_rejected.inc();
    }

    pub fn inc_process_error(&self) {
        self.process_errors.inc();
    }

    pub fn set_pool_status(&self, capacity: usize, running: usize, waiting: usize) {
        self.pool_capacity.set(capacity as i64);
        self.pool_running.set(running as i64);
        self.pool_waiting.set(waiting as i64);
    }

    /// Current value of `syslog_total` for a tag.
    pub fn events(&self, tag: &str) -> u64 {
        self.events_total.with_label_values(&[tag]).get()
    }

    /// Current value of `syslog_drop_total` for a reason.
    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drop_total.with_label_values(&[reason.as_str()]).get()
    }

    pub fn dispatch_rejected(&self) -> u64 {
        self.dispatch_rejected.get()
    }

    pub fn receiver_errors(&self) -> u64 {
        self.receiver_errors.get()
    }

    pub fn process_errors(&self) -> u64 {
        self.process_errors.get()
    }

    /// Export all metrics in Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
