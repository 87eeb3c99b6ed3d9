//! Regex-driven extraction of DNS query metadata from syslog bodies.
//!
//! A [`Parser`] holds only the immutable time configuration, so a single
//! instance is shared by every worker. Each call matches one compiled
//! pattern against one message body and binds the pattern's named capture
//! groups onto a [`DnsEvent`].

pub mod qname;
pub mod time;

use std::net::IpAddr;

use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

use crate::dns::types::{
    CLASS_IN, TYPE_A, TYPE_CNAME, class_from_str, rcode_from_str, record_type_from_str,
};
use crate::dns::{DnsEvent, Rr};
use self::qname::{normalize_qname, parse_domain_type1};

/// Source discriminator carried on every event this pipeline emits.
const SERVER_TYPE_SYSLOG: u32 = 9;

/// Per-record parse failure.
///
/// `NotMatch` and `EmptyInput` mean "try the next pattern"; every other
/// variant is a failure of the pattern that matched and drops the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("message did not match")]
    NotMatch,
    #[error("empty message body")]
    EmptyInput,
    #[error("invalid client address: {0}")]
    InvalidClientAddress(String),
    #[error("query name is empty")]
    EmptyQueryName,
    #[error("time layout is not configured")]
    TimeLayoutUnset,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl ParseError {
    /// True when the next configured pattern should still be tried.
    pub fn is_no_match(&self) -> bool {
        matches!(self, ParseError::NotMatch | ParseError::EmptyInput)
    }
}

pub struct Parser {
    time_layout: Option<String>,
    zone: Tz,
}

impl Parser {
    pub fn new(zone: Tz, time_layout: Option<String>) -> Self {
        Self { time_layout, zone }
    }

    /// Match one pattern against one message body.
    ///
    /// `arrival` is the record's arrival time in epoch seconds; it becomes
    /// `t_now` unless a datetime group overrides it.
    pub fn parse_regexp(
        &self,
        re: &Regex,
        content: &str,
        arrival: u32,
    ) -> Result<DnsEvent, ParseError> {
        if content.is_empty() {
            return Err(ParseError::EmptyInput);
        }
        let caps = re.captures(content).ok_or(ParseError::NotMatch)?;

        let mut event = DnsEvent {
            server_type: SERVER_TYPE_SYSLOG,
            t_now: arrival,
            ..DnsEvent::default()
        };

        // capture_names yields groups in pattern order, so rdata sees the
        // query name bound by an earlier group, matching source behavior
        for name in re.capture_names().flatten() {
            let Some(m) = caps.name(name) else { continue };
            let value = m.as_str();
            match name {
                "client_ip" => event.client_address = value.to_string(),
                "server_ip" => event.server_address = value.to_string(),
                // 1-1-1-1 style
                "server_ip_type1" => event.server_address = value.replace('-', "."),
                "client_port" => {
                    if let Ok(port) = value.parse::<u32>() {
                        event.client_port = port;
                    }
                }
                "client_port_hex" => {
                    if let Ok(port) = u32::from_str_radix(value, 16) {
                        event.client_port = port;
                    }
                }
                "server_port" => {
                    if let Ok(port) = value.parse::<u32>() {
                        event.server_port = port;
                    }
                }
                "query_name" => event.query_name = normalize_qname(value),
                "query_name_type1" => {
                    event.query_name = normalize_qname(&parse_domain_type1(value));
                }
                "query_class" => {
                    if let Some(class) = class_from_str(value) {
                        event.query_class = class;
                    }
                }
                "query_type" => {
                    if let Some(rtype) = record_type_from_str(value) {
                        event.query_type = rtype;
                    }
                }
                "datetime" => {
                    if let Some(ts) = time::parse_best_effort(value, self.zone) {
                        event.t_now = ts as u32;
                    }
                }
                "datetime_unix" => {
                    if let Ok(ts) = value.parse::<u32>() {
                        event.t_now = ts;
                    }
                }
                "datetime_layout" => {
                    let layout = self
                        .time_layout
                        .as_deref()
                        .ok_or(ParseError::TimeLayoutUnset)?;
                    let ts = time::parse_with_layout(value, layout, self.zone)
                        .ok_or_else(|| ParseError::InvalidTimestamp(value.to_string()))?;
                    event.t_now = ts as u32;
                }
                "rdata_type1" => self.bind_answer_rrs(&mut event, value),
                "transaction_id" => {
                    if let Ok(id) = value.parse::<u32>() {
                        event.dns_message_id = id;
                    }
                }
                "rcode" => {
                    if let Some(rcode) = rcode_from_str(value) {
                        event.rcode = rcode;
                    }
                }
                _ => {}
            }
        }

        if event.client_address.parse::<IpAddr>().is_err() {
            return Err(ParseError::InvalidClientAddress(event.client_address.clone()));
        }
        if event.query_name.is_empty() {
            return Err(ParseError::EmptyQueryName);
        }
        if event.query_type == 0 {
            event.query_type = TYPE_A;
        }
        Ok(event)
    }

    /// Decode a `(A_1.2.3.4;CNAME_cdn.example.com.)` style answer section.
    /// The owner name rolls forward through CNAME targets.
    fn bind_answer_rrs(&self, event: &mut DnsEvent, value: &str) {
        let cleaned = value.replace(['(', ')'], "");
        let mut rr_name = event.query_name.clone();
        for token in cleaned.split(';') {
            let Some((rtype_str, rdata)) = token.split_once('_') else {
                continue;
            };
            let rtype = record_type_from_str(rtype_str).unwrap_or(0);
            event.answer_rrs.push(Rr {
                name: rr_name.clone(),
                class: CLASS_IN,
                rtype,
                ttl: 65535,
                rdata: rdata.as_bytes().to_vec(),
            });
            if rtype == TYPE_CNAME {
                rr_name = normalize_qname(rdata);
            }
        }
    }
}
