use std::sync::Arc;

use clap::{Arg, Command};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use muninn::config::{SyslogConfig, parse_protocol_list};
use muninn::error::{MuninnError, Result};
use muninn::sink::{EventSink, LoggingSink};
use muninn::supervisor::{Supervisor, wait_for_shutdown_signal};

fn cli() -> Command {
    Command::new("muninn")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Syslog ingestion pipeline for DNS query logs")
        .arg(
            Arg::new("addr")
                .long("addr")
                .value_name("HOST")
                .help("Listen address")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Listen port")
                .default_value("1515"),
        )
        .arg(
            Arg::new("proto")
                .long("proto")
                .value_name("LIST")
                .help("Comma-separated listen protocols (UDP, TCP)")
                .default_value("UDP,TCP"),
        )
        .arg(
            Arg::new("worker")
                .long("worker")
                .value_name("NUMBER")
                .help("Initial worker pool capacity, 0 = cpu count * 100")
                .default_value("0"),
        )
        .arg(
            Arg::new("batchSize")
                .long("batchSize")
                .value_name("NUMBER")
                .help("Records per batch")
                .default_value("5000"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MILLIS")
                .help("Batch flush timeout in milliseconds")
                .default_value("100"),
        )
        .arg(
            Arg::new("timeLayout")
                .long("timeLayout")
                .value_name("FORMAT")
                .help("chrono format for the datetime_layout capture group"),
        )
        .arg(
            Arg::new("timeLocation")
                .long("timeLocation")
                .value_name("ZONE")
                .help("IANA time zone for naive timestamps")
                .default_value("Asia/Shanghai"),
        )
        .arg(
            Arg::new("regexp")
                .long("regexp")
                .value_name("PATTERN")
                .help("Extraction pattern with named groups; repeatable, ordered")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("pprof")
                .long("pprof")
                .value_name("PORT")
                .help("Diagnostics HTTP port (metrics, health), 0 disables")
                .default_value("6060"),
        )
}

/// Defaults, overridden by MUNINN_* environment variables, overridden by
/// explicitly set CLI flags. Declared defaults apply to unset flags.
fn build_config() -> Result<SyslogConfig> {
    let matches = cli().get_matches();
    let mut config = SyslogConfig::from_env()?;

    let flag_set =
        |name: &str| matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine);

    let addr = matches
        .get_one::<String>("addr")
        .map(String::as_str)
        .unwrap_or("0.0.0.0");
    let port = matches
        .get_one::<String>("port")
        .map(String::as_str)
        .unwrap_or("1515");
    if flag_set("addr") || flag_set("port") {
        let combined = format!("{}:{}", addr, port);
        config.listen_addr = combined
            .parse()
            .map_err(|_| MuninnError::InvalidListenAddress(combined))?;
    }

    if let Some(proto) = matches.get_one::<String>("proto") {
        if flag_set("proto") {
            config.protocols = parse_protocol_list(proto)?;
        }
    }

    if flag_set("worker") {
        let worker = matches.get_one::<String>("worker").expect("has default");
        config.workers = worker.parse().map_err(|_| MuninnError::InvalidFlag {
            name: "worker",
            value: worker.clone(),
        })?;
    }

    if flag_set("batchSize") {
        let batch = matches.get_one::<String>("batchSize").expect("has default");
        config.batch_size = batch.parse().map_err(|_| MuninnError::InvalidFlag {
            name: "batchSize",
            value: batch.clone(),
        })?;
    }

    if flag_set("timeout") {
        let timeout = matches.get_one::<String>("timeout").expect("has default");
        let millis: u64 = timeout.parse().map_err(|_| MuninnError::InvalidFlag {
            name: "timeout",
            value: timeout.clone(),
        })?;
        config.batch_timeout = std::time::Duration::from_millis(millis);
    }

    if let Some(layout) = matches.get_one::<String>("timeLayout") {
        if !layout.is_empty() {
            config.time_layout = Some(layout.clone());
        }
    }

    if flag_set("timeLocation") {
        config.time_location = matches
            .get_one::<String>("timeLocation")
            .expect("has default")
            .clone();
    }

    if let Some(patterns) = matches.get_many::<String>("regexp") {
        config.regexps = patterns.cloned().collect();
    }

    if flag_set("pprof") {
        let port = matches.get_one::<String>("pprof").expect("has default");
        config.http_bind_addr = if port == "0" {
            None
        } else {
            let combined = format!("127.0.0.1:{}", port);
            Some(
                combined
                    .parse()
                    .map_err(|_| MuninnError::InvalidHttpBindAddress(combined))?,
            )
        };
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("muninn=info")),
        )
        .init();

    let config = match build_config() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "starting: addr={}, protocols={:?}, workers={}, batch_size={}, timeout={:?}, patterns={}",
        config.listen_addr,
        config.protocols,
        config.effective_workers(),
        config.batch_size,
        config.batch_timeout,
        config.regexps.len()
    );

    let sink: Arc<dyn EventSink> = Arc::new(LoggingSink::new());
    let supervisor = match Supervisor::start(config, Some(sink)).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };

    wait_for_shutdown_signal().await;

    if let Err(e) = supervisor.shutdown().await {
        error!("error during shutdown: {}", e);
    }
    std::process::exit(2);
}
