//! Batch handler: runs the regex parser over each record in a batch and
//! forwards the resulting events to the sink.

use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::metrics::{DropReason, PipelineMetrics};
use crate::parse::Parser;
use crate::processor::BatchHandler;
use crate::receiver::LogRecord;
use crate::sink::EventSink;

pub struct ParseHandler {
    parser: Parser,
    regexps: Arc<Vec<Regex>>,
    metrics: Arc<PipelineMetrics>,
    sink: Option<Arc<dyn EventSink>>,
}

impl ParseHandler {
    pub fn new(
        parser: Parser,
        regexps: Arc<Vec<Regex>>,
        metrics: Arc<PipelineMetrics>,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            parser,
            regexps,
            metrics,
            sink,
        }
    }

    /// Parse one record: first matching pattern wins. A validation failure
    /// on the matched pattern drops the record rather than falling through
    /// to later patterns.
    fn handle_record(&self, record: &LogRecord) {
        if self.regexps.is_empty() {
            warn!("rule_is_empty: {} {}", record.tag, record.content);
            self.metrics.record_drop(DropReason::RuleEmpty);
            return;
        }

        let arrival = record.arrival_epoch();
        for re in self.regexps.iter() {
            match self.parser.parse_regexp(re, &record.content, arrival) {
                Ok(event) => {
                    match &self.sink {
                        Some(sink) => {
                            self.metrics.record_event(&record.tag);
                            sink.accept(event);
                        }
                        None => {
                            warn!("server_nil: {} {}", record.tag, record.content);
                            self.metrics.record_drop(DropReason::ServerNil);
                        }
                    }
                    return;
                }
                Err(e) if e.is_no_match() => continue,
                Err(e) => {
                    warn!(
                        "parse_error: tag={} err={} content={}",
                        record.tag, e, record.content
                    );
                    self.metrics.record_drop(DropReason::ParseError);
                    return;
                }
            }
        }

        warn!("not_match: tag={} |content={}", record.tag, record.content);
        self.metrics.record_drop(DropReason::NotMatch);
    }
}

impl BatchHandler for ParseHandler {
    fn handle_batch(&self, batch: Vec<LogRecord>) -> Result<()> {
        for record in &batch {
            self.handle_record(record);
        }
        Ok(())
    }
}
