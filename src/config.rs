use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::MuninnError;

/// Default pattern for BIND query logs, matching lines like
/// `12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620
/// 223.2.43.8#23253 (api.miwifi.com): view ext2: query: api.miwifi.com
/// IN AAAA + (202.119.104.31)`.
pub const DEFAULT_BIND_REGEX: &str = r"(?P<datetime>.*?) queries: client .+ (?P<client_ip>.*?)#(?P<client_port>[0-9]*?) \((?P<query_name>.*?)\): view .+ query: .+ IN (?P<query_type>.*?) .+ \((?P<server_ip>.*?)\)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl FromStr for Protocol {
    type Err = MuninnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UDP" => Ok(Protocol::Udp),
            "TCP" => Ok(Protocol::Tcp),
            other => Err(MuninnError::InvalidProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Tcp => write!(f, "TCP"),
        }
    }
}

/// Process-wide pipeline configuration, loaded once at startup and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct SyslogConfig {
    /// Address the syslog listeners bind to
    pub listen_addr: SocketAddr,

    /// Protocols to listen on; at least one required
    pub protocols: Vec<Protocol>,

    /// Initial worker pool capacity; 0 means cpu_count * 100
    pub workers: usize,

    /// Records per batch
    pub batch_size: usize,

    /// Maximum latency before a partial batch is flushed
    pub batch_timeout: Duration,

    /// Ordered extraction patterns with named capture groups
    pub regexps: Vec<String>,

    /// Optional chrono format for the `datetime_layout` group
    pub time_layout: Option<String>,

    /// IANA zone naive timestamps are interpreted in
    pub time_location: String,

    /// Receive queue depth shared by all listeners
    pub queue_capacity: usize,

    /// Diagnostics HTTP endpoint (metrics, health); None disables it
    pub http_bind_addr: Option<SocketAddr>,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:1515"
                .parse()
                .expect("default listen address is valid"),
            protocols: vec![Protocol::Udp, Protocol::Tcp],
            workers: 0,
            batch_size: 5000,
            batch_timeout: Duration::from_millis(100),
            regexps: vec![DEFAULT_BIND_REGEX.to_string()],
            time_layout: None,
            time_location: "Asia/Shanghai".to_string(),
            queue_capacity: 50_000,
            http_bind_addr: Some(
                "127.0.0.1:6060"
                    .parse()
                    .expect("default HTTP bind address is valid"),
            ),
        }
    }
}

impl SyslogConfig {
    /// Build a configuration from defaults overridden by `MUNINN_*`
    /// environment variables.
    pub fn from_env() -> Result<Self, MuninnError> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MUNINN_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|_| MuninnError::InvalidListenAddress(addr))?;
        }

        if let Ok(protocols) = std::env::var("MUNINN_PROTOCOLS") {
            config.protocols = parse_protocol_list(&protocols)?;
        }

        if let Ok(workers) = std::env::var("MUNINN_WORKERS") {
            config.workers = workers.parse().map_err(|_| MuninnError::InvalidFlag {
                name: "MUNINN_WORKERS",
                value: workers,
            })?;
        }

        if let Ok(batch_size) = std::env::var("MUNINN_BATCH_SIZE") {
            config.batch_size = batch_size.parse().map_err(|_| MuninnError::InvalidFlag {
                name: "MUNINN_BATCH_SIZE",
                value: batch_size,
            })?;
        }

        if let Ok(timeout_ms) = std::env::var("MUNINN_BATCH_TIMEOUT_MS") {
            let millis: u64 = timeout_ms.parse().map_err(|_| MuninnError::InvalidFlag {
                name: "MUNINN_BATCH_TIMEOUT_MS",
                value: timeout_ms,
            })?;
            config.batch_timeout = Duration::from_millis(millis);
        }

        if let Ok(patterns) = std::env::var("MUNINN_REGEXPS") {
            // Newline-separated; patterns may contain commas
            let list: Vec<String> = patterns
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            config.regexps = list;
        }

        if let Ok(layout) = std::env::var("MUNINN_TIME_LAYOUT") {
            if !layout.is_empty() {
                config.time_layout = Some(layout);
            }
        }

        if let Ok(location) = std::env::var("MUNINN_TIME_LOCATION") {
            if !location.is_empty() {
                config.time_location = location;
            }
        }

        if let Ok(capacity) = std::env::var("MUNINN_QUEUE_CAPACITY") {
            config.queue_capacity = capacity.parse().map_err(|_| MuninnError::InvalidFlag {
                name: "MUNINN_QUEUE_CAPACITY",
                value: capacity,
            })?;
        }

        if let Ok(addr) = std::env::var("MUNINN_HTTP_ADDR") {
            config.http_bind_addr = if addr.is_empty() || addr == "0" {
                None
            } else {
                Some(
                    addr.parse()
                        .map_err(|_| MuninnError::InvalidHttpBindAddress(addr))?,
                )
            };
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MuninnError> {
        if self.protocols.is_empty() {
            return Err(MuninnError::NoProtocols);
        }
        if self.batch_size == 0 {
            return Err(MuninnError::InvalidFlag {
                name: "batchSize",
                value: "0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(MuninnError::InvalidFlag {
                name: "queue_capacity",
                value: "0".to_string(),
            });
        }
        self.time_location
            .parse::<Tz>()
            .map_err(|_| MuninnError::InvalidTimeZone(self.time_location.clone()))?;
        Ok(())
    }

    /// Initial pool capacity: the configured worker count, or
    /// cpu_count * 100 when unset.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            cpu_count() * 100
        } else {
            self.workers
        }
    }
}

/// Comma-separated protocol list, case-insensitive.
pub fn parse_protocol_list(list: &str) -> Result<Vec<Protocol>, MuninnError> {
    let mut protocols = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let protocol: Protocol = part.parse()?;
        if !protocols.contains(&protocol) {
            protocols.push(protocol);
        }
    }
    Ok(protocols)
}

pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyslogConfig::default();
        assert_eq!(config.batch_size, 5000);
        assert_eq!(config.batch_timeout, Duration::from_millis(100));
        assert_eq!(config.queue_capacity, 50_000);
        assert_eq!(config.time_location, "Asia/Shanghai");
        assert_eq!(config.regexps, vec![DEFAULT_BIND_REGEX.to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_workers_auto() {
        let config = SyslogConfig::default();
        assert_eq!(config.effective_workers(), cpu_count() * 100);

        let explicit = SyslogConfig {
            workers: 32,
            ..SyslogConfig::default()
        };
        assert_eq!(explicit.effective_workers(), 32);
    }

    #[test]
    fn test_protocol_list_parsing() {
        assert_eq!(
            parse_protocol_list("udp, tcp").unwrap(),
            vec![Protocol::Udp, Protocol::Tcp]
        );
        assert_eq!(parse_protocol_list("TCP").unwrap(), vec![Protocol::Tcp]);
        assert!(parse_protocol_list("sctp").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_zone_and_empty_protocols() {
        let bad_zone = SyslogConfig {
            time_location: "Mars/Olympus".to_string(),
            ..SyslogConfig::default()
        };
        assert!(matches!(
            bad_zone.validate(),
            Err(MuninnError::InvalidTimeZone(_))
        ));

        let no_proto = SyslogConfig {
            protocols: vec![],
            ..SyslogConfig::default()
        };
        assert!(matches!(no_proto.validate(), Err(MuninnError::NoProtocols)));
    }
}
