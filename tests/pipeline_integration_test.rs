//! End-to-end pipeline tests over real sockets.

use std::sync::Arc;
use std::time::Duration;

use muninn::config::{Protocol, SyslogConfig};
use muninn::error::MuninnError;
use muninn::metrics::DropReason;
use muninn::sink::{CollectingSink, EventSink};
use muninn::supervisor::Supervisor;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

const BIND_QUERY_LINE: &str = "12-Sep-2025 17:03:56.635 queries: client @0x7f22f404b620 \
     223.2.43.8#23253 (api.miwifi.com): view ext2: query: api.miwifi.com IN AAAA + \
     (202.119.104.31)";

fn test_config(protocols: Vec<Protocol>) -> SyslogConfig {
    SyslogConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        protocols,
        workers: 16,
        batch_size: 1,
        batch_timeout: Duration::from_millis(10),
        queue_capacity: 1024,
        http_bind_addr: None,
        ..SyslogConfig::default()
    }
}

fn framed(body: &str) -> String {
    format!("<30>Sep 12 17:03:57 resolver1 named: {body}")
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_udp_ingest_end_to_end() {
    let sink = Arc::new(CollectingSink::new());
    let supervisor = Supervisor::start(
        test_config(vec![Protocol::Udp]),
        Some(sink.clone() as Arc<dyn EventSink>),
    )
    .await
    .unwrap();
    let addr = supervisor.udp_addr().expect("UDP listener bound");

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket
        .send_to(framed(BIND_QUERY_LINE).as_bytes(), addr)
        .await
        .unwrap();

    assert!(wait_until(|| sink.len() == 1).await);

    let event = &sink.snapshot()[0];
    assert_eq!(event.server_type, 9);
    assert_eq!(event.client_address, "223.2.43.8");
    assert_eq!(event.client_port, 23253);
    assert_eq!(event.query_name, "api.miwifi.com");
    assert_eq!(event.query_type, 28);
    assert_eq!(event.server_address, "202.119.104.31");

    let metrics = supervisor.metrics();
    assert_eq!(metrics.events("named"), 1);
    assert_eq!(metrics.drops(DropReason::NotMatch), 0);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_tcp_ingest_accounting() {
    let sink = Arc::new(CollectingSink::new());
    let supervisor = Supervisor::start(
        test_config(vec![Protocol::Tcp]),
        Some(sink.clone() as Arc<dyn EventSink>),
    )
    .await
    .unwrap();
    let addr = supervisor.tcp_addr().expect("TCP listener bound");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for i in 0..100 {
        let body = if i % 2 == 0 {
            BIND_QUERY_LINE.to_string()
        } else {
            format!("kernel message {i} that matches nothing")
        };
        stream
            .write_all(format!("{}\n", framed(&body)).as_bytes())
            .await
            .unwrap();
    }
    stream.flush().await.unwrap();

    let metrics = supervisor.metrics();
    assert!(
        wait_until(|| {
            metrics.events("named") + metrics.drops(DropReason::NotMatch) == 100
        })
        .await
    );
    assert_eq!(metrics.events("named"), 50);
    assert_eq!(metrics.drops(DropReason::NotMatch), 50);
    assert_eq!(sink.len(), 50);

    supervisor.shutdown().await.unwrap();
}

// Overload-shaped burst: every record is accounted exactly once across
// events, drops and rejections, with a deliberately tiny receive queue
#[tokio::test]
async fn test_burst_accounting_with_tiny_queue() {
    let sink = Arc::new(CollectingSink::new());
    let config = SyslogConfig {
        queue_capacity: 4,
        workers: 1,
        ..test_config(vec![Protocol::Tcp])
    };
    let supervisor = Supervisor::start(config, Some(sink.clone() as Arc<dyn EventSink>))
        .await
        .unwrap();
    let addr = supervisor.tcp_addr().expect("TCP listener bound");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for _ in 0..1000 {
        stream
            .write_all(format!("{}\n", framed(BIND_QUERY_LINE)).as_bytes())
            .await
            .unwrap();
    }
    stream.flush().await.unwrap();
    drop(stream);

    let metrics = supervisor.metrics();
    assert!(
        wait_until(|| {
            metrics.events("named")
                + metrics.drops(DropReason::QueueFull)
                + metrics.dispatch_rejected()
                == 1000
        })
        .await
    );

    supervisor.shutdown().await.unwrap();
    // Nothing is accounted twice
    assert_eq!(
        metrics.events("named")
            + metrics.drops(DropReason::QueueFull)
            + metrics.dispatch_rejected(),
        1000
    );
}

// Batch timeout: a lulled partial buffer flushes when the next record
// arrives, so all four records surface after the fourth submission
#[tokio::test]
async fn test_batch_timeout_flush() {
    let sink = Arc::new(CollectingSink::new());
    let config = SyslogConfig {
        batch_size: 1000,
        batch_timeout: Duration::from_millis(50),
        ..test_config(vec![Protocol::Tcp])
    };
    let supervisor = Supervisor::start(config, Some(sink.clone() as Arc<dyn EventSink>))
        .await
        .unwrap();
    let addr = supervisor.tcp_addr().expect("TCP listener bound");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for _ in 0..3 {
        stream
            .write_all(format!("{}\n", framed(BIND_QUERY_LINE)).as_bytes())
            .await
            .unwrap();
    }
    stream.flush().await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    stream
        .write_all(format!("{}\n", framed(BIND_QUERY_LINE)).as_bytes())
        .await
        .unwrap();
    stream.flush().await.unwrap();

    assert!(wait_until(|| sink.len() == 4).await);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_graceful_shutdown_mid_stream() {
    let sink = Arc::new(CollectingSink::new());
    let supervisor = Supervisor::start(
        test_config(vec![Protocol::Tcp]),
        Some(sink.clone() as Arc<dyn EventSink>),
    )
    .await
    .unwrap();
    let addr = supervisor.tcp_addr().expect("TCP listener bound");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for _ in 0..200 {
        stream
            .write_all(format!("{}\n", framed(BIND_QUERY_LINE)).as_bytes())
            .await
            .unwrap();
    }
    stream.flush().await.unwrap();

    // Let ingestion get under way, then stop while records may still be
    // in flight
    let metrics = supervisor.metrics();
    assert!(wait_until(|| metrics.events("named") >= 50).await);
    supervisor.shutdown().await.unwrap();

    // Whatever the receiver handed over is accounted for, nothing twice
    let accounted = metrics.events("named")
        + metrics.drops(DropReason::NotMatch)
        + metrics.drops(DropReason::ParseError)
        + metrics.dispatch_rejected();
    assert!(accounted >= 50);
    assert!(accounted <= 200);
    assert_eq!(sink.len() as u64, metrics.events("named"));
}

#[tokio::test]
async fn test_pool_capacity_defaults_to_cpu_times_100() {
    let supervisor = Supervisor::start(
        SyslogConfig {
            workers: 0,
            ..test_config(vec![Protocol::Udp])
        },
        None,
    )
    .await
    .unwrap();

    let expected = muninn::config::cpu_count() * 100;
    assert_eq!(supervisor.pool().capacity(), expected);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_pattern_fails_startup() {
    let config = SyslogConfig {
        regexps: vec!["(?P<unclosed".to_string()],
        ..test_config(vec![Protocol::Udp])
    };
    let err = Supervisor::start(config, None).await.unwrap_err();
    assert!(matches!(err, MuninnError::InvalidPattern { .. }));
}

#[tokio::test]
async fn test_tcp_bind_conflict_fails_startup() {
    let holder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = holder.local_addr().unwrap();

    let config = SyslogConfig {
        listen_addr: taken,
        ..test_config(vec![Protocol::Tcp])
    };
    let err = Supervisor::start(config, None).await.unwrap_err();
    assert!(matches!(err, MuninnError::Io(_)));
}
