#![warn(missing_docs)]

//! sslcaudit server: audits every connecting client with the configured batteries

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sslcaudit_core::probe::ClientHelloProbe;
use sslcaudit_core::{
    event_channel, AuditConfig, AuditDispatcher, AuditServer, Auditor, AuditorSet, BatteryConfig,
    EventReceiver,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sslcaudit")]
#[command(about = "Audit connecting TLS clients one test per connection", long_about = None)]
struct Cli {
    /// TOML or JSON configuration file.
    #[arg(short, long, env = "SSLCAUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured listen address.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

fn builtin_auditor(name: &str) -> Option<Arc<dyn Auditor>> {
    match name {
        ClientHelloProbe::NAME => Some(Arc::new(ClientHelloProbe::new())),
        _ => None,
    }
}

/// How long shutdown waits for queued events to be printed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Writes each event as one JSON line until every publisher is gone.
async fn print_events<W: Write>(mut receiver: EventReceiver, mut out: W) -> usize {
    let mut printed = 0;
    while let Some(event) = receiver.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to write event");
            break;
        }
        printed += 1;
    }
    printed
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AuditConfig::from_file(path)?,
        None => AuditConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if config.batteries.is_empty() {
        tracing::warn!("no batteries configured, using the built-in probe");
        config
            .batteries
            .push(BatteryConfig::new("probe", &[ClientHelloProbe::NAME]));
    }

    let auditors = AuditorSet::from_config(&config, builtin_auditor)?;
    tracing::info!(
        batteries = auditors.batteries().len(),
        auditors = auditors.len(),
        "sslcaudit starting"
    );

    let (events, receiver) = event_channel();
    let dispatcher = AuditDispatcher::new(auditors, events);
    let server = AuditServer::bind(&config, dispatcher).await?;

    let printer = tokio::spawn(print_events(receiver, std::io::stdout()));

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let stats = server.stats();
    tracing::info!(accepted = stats.accepted, failed = stats.failed, "sslcaudit stopped");
    // closes the stream once in-flight audits release their publishers
    drop(server);
    match tokio::time::timeout(DRAIN_TIMEOUT, printer).await {
        Ok(Ok(printed)) => tracing::debug!(printed, "event stream drained"),
        Ok(Err(e)) => tracing::warn!(error = %e, "event printer failed"),
        Err(_) => tracing::warn!("audits still running, remaining events not printed"),
    }
    Ok(())
}
