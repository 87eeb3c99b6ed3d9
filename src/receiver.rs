//! Syslog listeners: frame RFC 3164 messages from UDP datagrams and TCP
//! streams into [`LogRecord`]s on the shared bounded receive queue.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_channel::{Sender, TrySendError};
use chrono::{DateTime, Datelike, Utc};
use syslog_loose::{IncompleteDate, Variant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Protocol, SyslogConfig};
use crate::error::{MuninnError, Result};
use crate::metrics::{DropReason, PipelineMetrics};

/// Largest datagram the UDP listener accepts.
const MAX_DATAGRAM: usize = 65_536;

/// One received syslog message, framed into typed fields.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Program/app identifier from the syslog header; empty when absent
    pub tag: String,
    /// Message body
    pub content: String,
    pub facility: Option<String>,
    pub severity: Option<String>,
    pub hostname: Option<String>,
    /// Header timestamp, when the sender supplied one
    pub timestamp: Option<DateTime<Utc>>,
    /// Remote peer that sent the message
    pub client_addr: SocketAddr,
    /// Monotonic arrival instant
    pub received_at: Instant,
}

impl LogRecord {
    /// Arrival time as epoch seconds, derived from the monotonic instant.
    pub fn arrival_epoch(&self) -> u32 {
        let elapsed = self.received_at.elapsed().as_secs() as i64;
        (Utc::now().timestamp() - elapsed).max(0) as u32
    }
}

/// Resolve the year for RFC 3164 timestamps that omit it: a December
/// message seen in January belongs to the previous year.
fn resolve_year((month, _date, _hour, _min, _sec): IncompleteDate) -> i32 {
    let now = Utc::now();
    if now.month() == 1 && month == 12 {
        now.year() - 1
    } else {
        now.year()
    }
}

/// Frame one raw message into a LogRecord. Header fields that are missing
/// stay empty; the whole line becomes the body when it is not syslog at all.
pub fn frame_message(raw: &str, client_addr: SocketAddr) -> LogRecord {
    let parsed = syslog_loose::parse_message_with_year(raw.trim(), resolve_year, Variant::Either);
    LogRecord {
        tag: parsed.appname.map(str::to_string).unwrap_or_default(),
        content: parsed.msg.to_string(),
        facility: parsed.facility.map(|f| f.as_str().to_string()),
        severity: parsed.severity.map(|s| s.as_str().to_string()),
        hostname: parsed.hostname.map(str::to_string),
        timestamp: parsed.timestamp.map(DateTime::<Utc>::from),
        client_addr,
        received_at: Instant::now(),
    }
}

/// UDP and/or TCP syslog listeners feeding the shared receive queue.
pub struct SyslogReceiver {
    udp: Option<UdpSocket>,
    tcp: Option<TcpListener>,
    tx: Sender<LogRecord>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
}

impl SyslogReceiver {
    /// Bind the configured protocols. A protocol that fails to bind is
    /// logged and skipped; when nothing binds the startup fails.
    pub async fn bind(
        config: &SyslogConfig,
        tx: Sender<LogRecord>,
        metrics: Arc<PipelineMetrics>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut udp = None;
        let mut tcp = None;
        let mut last_err: Option<MuninnError> = None;

        for protocol in &config.protocols {
            match protocol {
                Protocol::Udp => match UdpSocket::bind(config.listen_addr).await {
                    Ok(socket) => {
                        info!("syslog UDP listener bound on {}", socket.local_addr()?);
                        udp = Some(socket);
                    }
                    Err(e) => {
                        error!("failed to bind UDP {}: {}", config.listen_addr, e);
                        last_err = Some(e.into());
                    }
                },
                Protocol::Tcp => match TcpListener::bind(config.listen_addr).await {
                    Ok(listener) => {
                        info!("syslog TCP listener bound on {}", listener.local_addr()?);
                        tcp = Some(listener);
                    }
                    Err(e) => {
                        error!("failed to bind TCP {}: {}", config.listen_addr, e);
                        last_err = Some(e.into());
                    }
                },
            }
        }

        if udp.is_none() && tcp.is_none() {
            return Err(last_err.unwrap_or(MuninnError::NoProtocols));
        }

        Ok(Self {
            udp,
            tcp,
            tx,
            metrics,
            cancel,
        })
    }

    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Spawn the listener tasks. The receiver's queue senders live inside
    /// the tasks, so the queue closes once every listener has stopped.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(socket) = self.udp {
            handles.push(tokio::spawn(run_udp(
                socket,
                self.tx.clone(),
                self.metrics.clone(),
                self.cancel.clone(),
            )));
        }
        if let Some(listener) = self.tcp {
            handles.push(tokio::spawn(run_tcp(
                listener,
                self.tx.clone(),
                self.metrics.clone(),
                self.cancel.clone(),
            )));
        }
        handles
    }
}

async fn run_udp(
    socket: UdpSocket,
    tx: Sender<LogRecord>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("UDP listener stopping");
                break;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    let raw = String::from_utf8_lossy(&buf[..len]);
                    let record = frame_message(&raw, peer);
                    match tx.try_send(record) {
                        Ok(()) => {}
                        // Queue full: UDP has no flow control, drop the datagram
                        Err(TrySendError::Full(_)) => {
                            metrics.record_drop(DropReason::QueueFull);
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                Err(e) => {
                    metrics.inc_receiver_error();
                    warn!("UDP receive error: {}", e);
                }
            }
        }
    }
}

async fn run_tcp(
    listener: TcpListener,
    tx: Sender<LogRecord>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("TCP listener stopping");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_tcp_connection(
                        stream,
                        peer,
                        tx.clone(),
                        metrics.clone(),
                        cancel.clone(),
                    ));
                }
                Err(e) => {
                    metrics.inc_receiver_error();
                    warn!("TCP accept error: {}", e);
                }
            }
        }
    }
}

/// Read newline-delimited frames from one connection. Sending into the
/// bounded queue awaits when it is full, which is the TCP backpressure.
async fn handle_tcp_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: Sender<LogRecord>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = frame_message(&line, peer);
                    if tx.send(record).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("TCP connection closed by {}", peer);
                    break;
                }
                Err(e) => {
                    metrics.inc_receiver_error();
                    warn!("TCP read error from {}: {}", peer, e);
                    break;
                }
            }
        }
    }
}
