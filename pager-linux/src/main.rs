// Pager for Linux: interactive text messaging over a UDP multicast radio link.

mod config;
mod radio;

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pager_core::{Pager, ShutdownReason, StdoutConsole};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pager", version)]
#[command(about = "📟 Send and receive short text messages over a radio link")]
struct Cli {
    /// RF frequency in MHz [default: 915.0]
    #[arg(long)]
    freq: Option<f64>,

    /// Destination node ID [default: 2]
    #[arg(long)]
    dest: Option<u16>,

    /// This node's ID [default: 1]
    #[arg(long)]
    node: Option<u16>,

    /// Config file (TOML)
    #[arg(long, env = "PAGER_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = config::Overrides {
        node_id: cli.node,
        dest: cli.dest,
        frequency_mhz: cli.freq,
    };
    let cfg = config::load(cli.config.as_deref(), &overrides)?;
    tracing::debug!(?cfg, "configuration loaded");

    let radio = radio::UdpRadio::new(cfg.multicast_group, cfg.base_port);
    let pager = Pager::new(cfg.pager_config(), radio, Arc::new(StdoutConsole));
    let interrupt = pager.shutdown_handle();
    let running = pager
        .start(BufReader::new(std::io::stdin()))
        .context("starting pager")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reason = rt.block_on(async {
        let mut waiter = tokio::task::spawn_blocking(move || running.wait());
        let joined = tokio::select! {
            joined = &mut waiter => joined,
            sig = shutdown_signal() => {
                sig?;
                interrupt.signal(ShutdownReason::Interrupted);
                waiter.await
            }
        };
        joined.context("supervisor task failed")
    })??;
    tracing::info!(?reason, "pager stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix). Blocked terminal reads are abandoned on exit.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
