// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod check;
mod cli;
pub mod config;
mod error;
mod kubernetes;
mod output;
mod probe;
pub mod progress;
mod route;
mod target;
mod topology;

use anyhow::{Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use check::{CheckEngine, CheckRegistry};
use cli::Args;
use config::{Config, Settings};
use kubernetes::{ClusterClient, KubeInventory, PortForwardTunnels};
use probe::LivenessProbe;
use progress::{ProgressUpdate, create_spinner};
use target::Target;
use topology::TopologyIndex;

/// Initialize logging to the rolling log file and stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("netkat.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose { "netkat=debug" } else { "netkat=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    // stderr shows errors only, unless -v
    let stderr_level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::ERROR
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NONE)
        .with_filter(stderr_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();

    // Always log to ~/.netkat/log/netkat.log; errors (everything with -v) to stderr
    init_logging(args.verbose);

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Ignoring config file: {:#}", e);
        Config::default()
    });
    let settings = Settings::resolve(&args, &config);

    let target = match Target::resolve(&args.target).await {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    info!(host = %target.host, port = target.port, path = %target.path, ip = %target.ip, "Target resolved");

    let healthy = diagnose(&args, &settings, &target).await?;
    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Load the cluster topology, run the built-in checks and print the report
async fn diagnose(args: &Args, settings: &Settings, target: &Target) -> Result<bool> {
    let spinner = create_spinner("Connecting to Kubernetes...");

    let cluster = match ClusterClient::connect(
        settings.context.as_deref(),
        settings.kubeconfig.as_deref(),
    )
    .await
    {
        Ok(cluster) => cluster,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message(format!("Loading topology from {}...", cluster.context()));
    let client = cluster.client();
    let topology = TopologyIndex::load(&KubeInventory::new(cluster)).await;
    if topology.is_empty() {
        warn!("Cluster topology is empty");
    }

    let tunnels = PortForwardTunnels::new(client, settings.tunnel_timeout);
    let probe = LivenessProbe::new(tunnels, &settings.probe_path, settings.request_timeout)?;
    let engine = CheckEngine::new(CheckRegistry::builtin(Arc::new(probe))?);

    let report = {
        let mut progress_rx = engine.progress().subscribe();
        let mut run = Box::pin(engine.run(target, &topology));

        loop {
            tokio::select! {
                biased;
                progress = progress_rx.recv() => {
                    match progress {
                        Ok(ProgressUpdate::CheckStarted { name }) => {
                            let (done, total) = engine.progress().progress();
                            spinner.set_message(format!("[{}/{}] {}...", done + 1, total, name));
                        }
                        Ok(ProgressUpdate::CheckComplete { name, passed: false, .. }) => {
                            spinner.set_message(format!("{} failed", name));
                        }
                        _ => {}
                    }
                }
                report = &mut run => {
                    break report;
                }
            }
        }
    };

    spinner.finish_and_clear();

    println!("{}", report.format(&args.output));
    Ok(report.is_healthy())
}
