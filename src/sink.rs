//! Downstream event sinks. The pipeline only requires `accept`; what
//! happens to an event afterwards is the sink's business.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dns::DnsEvent;

pub trait EventSink: Send + Sync {
    fn accept(&self, event: DnsEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn accept(&self, event: DnsEvent) {
        (**self).accept(event)
    }
}

/// Sink that logs each event as JSON at debug level and keeps a count.
/// Stands in for a real downstream until one is wired up.
#[derive(Default)]
pub struct LoggingSink {
    accepted: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

impl EventSink for LoggingSink {
    fn accept(&self, event: DnsEvent) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        match serde_json::to_string(&event) {
            Ok(json) => debug!("dns event: {}", json),
            Err(e) => warn!("failed to serialize dns event: {}", e),
        }
    }
}

/// Sink that retains every accepted event; used by tests to observe the
/// pipeline end to end.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DnsEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<DnsEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<DnsEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingSink {
    fn accept(&self, event: DnsEvent) {
        self.events.lock().push(event);
    }
}
