pub mod config;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{self, prelude::*, EnvFilter};

use dimse::{DimseScp, MppsService, RecoverySweeper};
use dimse_transform::{DoseSrTransformer, TemplateCache};

use crate::config::config::Config;

pub async fn run(config: Config) {
    let config = Arc::new(config);

    let env_filter = EnvFilter::try_new(&config.proxy.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.log_to_file {
        let file_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::fs::File::create(&config.logging.log_file_path).unwrap());

        let stdout_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_appender)
            .with(stdout_appender)
            .try_init()
            .expect("Failed to initialise logging");
    } else {
        tracing_subscriber::fmt()
            .with_file(true)
            .with_line_number(true)
            .with_env_filter(env_filter)
            .init();
    }

    tracing::info!(
        aes = config.application_entities.len(),
        "Starting mpps-proxy"
    );

    let transformer = Arc::new(DoseSrTransformer::new(Arc::new(TemplateCache::new())));
    let sweeper = RecoverySweeper::new();

    for ae in &config.application_entities {
        sweeper.sweep_ae(ae).await;
    }

    let shutdown = CancellationToken::new();
    let mut scp_handles = Vec::new();

    for ae in config.application_entities.clone() {
        let aet = ae.local_aet.clone();
        let mpps = Arc::new(MppsService::new(transformer.clone()));
        let scp = DimseScp::new(ae, mpps);
        let shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = scp.run() => {
                    if let Err(e) = result {
                        tracing::error!(aet = %aet, error = %e, "DIMSE SCP exited with error");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!(aet = %aet, "DIMSE SCP shutting down");
                }
            }
        });
        scp_handles.push(handle);
    }

    tracing::info!("all proxy application entities started, awaiting shutdown signal");
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c signal");

    tracing::info!("shutting down");
    shutdown.cancel();

    for handle in scp_handles {
        let _ = handle.await;
    }

    for ae in &config.application_entities {
        sweeper.sweep_ae(ae).await;
    }

    tracing::info!("mpps-proxy shut down gracefully");
}
