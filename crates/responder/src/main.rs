// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! cdsresponder: consume upload requests and reaper events.
//!
//! Exit codes: 0 after a signal-initiated shutdown, 1 for startup
//! failures and lost broker connections (the orchestrator restarts the
//! process and the crash loop is visible to monitoring).

use std::sync::Arc;

use cds_bus::{BusConfig, ConsumerRuntime, Publisher};
use cds_cluster::{bootstrap, KubeCluster};
use cds_responder::{
    CleanupHandler, InmetaSchema, JobTemplate, LaunchHandler, ResponderConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Publish retry budget for the report publisher.
const PUBLISH_RETRIES: u32 = 10;

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
    info!("terminated");
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

    let config = match ResponderConfig::from_env(&namespace) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };
    info!(namespace = %namespace, "startup - we are in namespace");

    let bus_config = match BusConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "broker configuration is incomplete");
            return 1;
        }
    };

    let sender = match Publisher::connect(
        bus_config.clone(),
        config.my_exchange.clone(),
        PUBLISH_RETRIES,
    )
    .await
    {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            error!(error = %e, "could not open broker connection");
            return 1;
        }
    };

    let client = match bootstrap::cluster_client().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not construct cluster client");
            return 1;
        }
    };
    let cluster = KubeCluster::new(client);

    let inmeta_schema = match InmetaSchema::load() {
        Ok(schema) => schema,
        Err(e) => {
            error!(error = %e, "could not load inmeta schema");
            return 1;
        }
    };
    let template = match JobTemplate::load(config.templates_path.as_deref()) {
        Ok(template) => template,
        Err(e) => {
            error!(error = %e, "could not load job template");
            return 1;
        }
    };

    let launch = match LaunchHandler::new(
        config.clone(),
        inmeta_schema,
        template,
        cluster.clone(),
        Arc::clone(&sender),
    ) {
        Ok(handler) => handler,
        Err(e) => {
            error!(error = %e, "could not build upload handler");
            return 1;
        }
    };
    let cleanup = match CleanupHandler::new(&config, cluster) {
        Ok(handler) => handler,
        Err(e) => {
            error!(error = %e, "could not build cleanup handler");
            return 1;
        }
    };

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let runtime = ConsumerRuntime::new(bus_config)
        .bind(config.upstream_exchange.clone(), Arc::new(launch))
        .bind(config.my_exchange.clone(), Arc::new(cleanup));

    match runtime.run(shutdown).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "broker connection failed");
            1
        }
    }
}

/// Stop the runloop cleanly on SIGINT/SIGTERM.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let interrupted = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut terminate =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(signal) => signal,
                    Err(e) => {
                        error!(error = %e, "could not install SIGTERM handler");
                        return;
                    }
                };
            tokio::select! {
                _ = interrupted => info!("caught interrupt, exiting"),
                _ = terminate.recv() => info!("caught SIGTERM, exiting"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = interrupted.await;
            info!("caught interrupt, exiting");
        }
        shutdown.cancel();
    });
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lapin=warn,kube=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
