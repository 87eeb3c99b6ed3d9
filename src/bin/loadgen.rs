//! Syslog load generator: sends RFC 3164 framed DNS query log lines over
//! UDP at a target rate, fanned out across worker tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Local;
use clap::{Arg, Command};
use rand::Rng;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Fixed BIND-style query log body, matching the pipeline's default pattern.
const QUERY_BODY: &str = "12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620 \
    223.2.43.8#23253 (api.miwifi.com): view ext2: query: api.miwifi.com IN AAAA + \
    (202.119.104.31)";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let matches = Command::new("muninn_loadgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate syslog DNS query log load against a muninn pipeline")
        .arg(
            Arg::new("raddr")
                .long("raddr")
                .value_name("ADDRESS:PORT")
                .help("Remote syslog server address")
                .default_value("127.0.0.1:1515"),
        )
        .arg(
            Arg::new("qps")
                .long("qps")
                .value_name("NUMBER")
                .help("Messages per second across all workers")
                .default_value("1000"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .value_name("NUMBER")
                .help("Total messages to send, -1 sends until interrupted")
                .default_value("-1")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("NUMBER")
                .help("Concurrent sender tasks")
                .default_value("0"),
        )
        .arg(
            Arg::new("tag")
                .long("tag")
                .value_name("TAG")
                .help("Syslog tag (app name) on every message")
                .default_value("named"),
        )
        .arg(
            Arg::new("random")
                .long("random")
                .help("Randomize client addresses and query names")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let raddr = matches.get_one::<String>("raddr").unwrap().clone();
    let qps: u64 = matches.get_one::<String>("qps").unwrap().parse()?;
    let count: i64 = matches.get_one::<String>("count").unwrap().parse()?;
    let mut workers: usize = matches.get_one::<String>("workers").unwrap().parse()?;
    let tag = matches.get_one::<String>("tag").unwrap().clone();
    let random = matches.get_flag("random");

    if workers == 0 {
        workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    }
    if qps == 0 {
        error!("qps must be positive");
        std::process::exit(1);
    }

    info!(
        "sending to {} at {} msg/s with {} workers (count {})",
        raddr, qps, workers, count
    );

    let sent = Arc::new(AtomicU64::new(0));
    let cancel = CancellationToken::new();

    // Per-worker share of the total message count, rounded up
    let per_worker_count = if count > 0 {
        Some((count as u64).div_ceil(workers as u64))
    } else {
        None
    };
    let interval = Duration::from_secs_f64(workers as f64 / qps as f64);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let raddr = raddr.clone();
        let tag = tag.clone();
        let sent = sent.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) =
                run_sender(&raddr, &tag, random, interval, per_worker_count, sent, cancel).await
            {
                error!("sender failed: {}", e);
            }
        }));
    }

    // Per-second stats ticker
    let stats_sent = sent.clone();
    let stats_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut last = 0u64;
        loop {
            tokio::select! {
                _ = stats_cancel.cancelled() => break,
                _ = interval.tick() => {
                    let current = stats_sent.load(Ordering::Relaxed);
                    info!("sent: {}, qps: {}", current, current - last);
                    last = current;
                }
            }
        }
    });

    let all_done = futures::future::join_all(handles);
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted, stopping senders"),
        _ = all_done => {}
    }
    cancel.cancel();

    info!("done, total sent: {}", sent.load(Ordering::Relaxed));
    Ok(())
}

async fn run_sender(
    raddr: &str,
    tag: &str,
    random: bool,
    interval: Duration,
    max_count: Option<u64>,
    sent: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(raddr).await?;

    let mut ticker = tokio::time::interval(interval);
    let mut local_sent = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(max) = max_count {
                    if local_sent >= max {
                        break;
                    }
                }
                let frame = build_frame(tag, random);
                socket.send(frame.as_bytes()).await?;
                local_sent += 1;
                sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    Ok(())
}

/// RFC 3164 frame: `<PRI>TIMESTAMP HOSTNAME TAG: BODY` with facility
/// local0, severity info.
fn build_frame(tag: &str, random: bool) -> String {
    let timestamp = Local::now().format("%b %e %H:%M:%S");
    let body = if random { random_body() } else { QUERY_BODY.to_string() };
    format!("<134>{} loadgen {}: {}", timestamp, tag, body)
}

fn random_body() -> String {
    let mut rng = rand::rng();
    let client = format!(
        "{}.{}.{}.{}",
        rng.random_range(1..=223u8),
        rng.random_range(0..=255u8),
        rng.random_range(0..=255u8),
        rng.random_range(1..=254u8)
    );
    let port: u16 = rng.random_range(1024..=65535);
    let name = format!("host{}.example{}.com", rng.random_range(0..10_000), rng.random_range(0..100));
    format!(
        "12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620 {client}#{port} ({name}): \
         view ext2: query: {name} IN A + (202.119.104.31)"
    )
}
