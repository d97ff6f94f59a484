// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! cdsreaper: watch cluster Jobs, publish lifecycle events.
//!
//! Exit codes: 1 for startup failures (configuration, broker, journal),
//! 2 for a fatal watcher error. The orchestrator restarts either way;
//! the distinction is for whoever reads the crash loop.

use cds_bus::{BusConfig, Publisher};
use cds_cluster::bootstrap;
use cds_reaper::{JobWatcher, Journal, JournalConfig};
use k8s_openapi::api::batch::v1::Job;
use kube::api::Api;
use tracing::{error, info};

/// Publish/setup retry budget once the process is up.
const STEADY_STATE_RETRIES: u32 = 10;

fn main() {
    init_tracing();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "could not start async runtime");
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(run());
    std::process::exit(code);
}

async fn run() -> i32 {
    let namespace = match bootstrap::current_namespace() {
        Ok(ns) => ns,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };
    info!(namespace = %namespace, "CDSReaper started up");

    let bus_config = match BusConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "broker configuration is incomplete");
            return 1;
        }
    };
    let exchange =
        std::env::var("MY_EXCHANGE").unwrap_or_else(|_| "cdsresponder".to_string());
    let sender = match Publisher::connect(bus_config, exchange, STEADY_STATE_RETRIES).await {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "could not open broker connection");
            return 1;
        }
    };

    let journal_config = match JournalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "journal configuration is incomplete");
            return 1;
        }
    };
    // Crash fast if the journal store is down at startup so monitoring
    // sees we are not running yet; once up, retry more to stay up.
    let mut journal = match Journal::connect(journal_config, 1).await {
        Ok(journal) => journal,
        Err(e) => {
            error!(error = %e, "could not open journal store connection");
            return 1;
        }
    };
    journal.set_max_retries(STEADY_STATE_RETRIES);

    let client = match bootstrap::cluster_client().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not construct cluster client");
            return 1;
        }
    };
    let jobs: Api<Job> = Api::namespaced(client, &namespace);

    let watcher = JobWatcher::new(sender, journal, namespace);
    match watcher.run(jobs).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "could not run the watcher");
            2
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lapin=warn,kube=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
