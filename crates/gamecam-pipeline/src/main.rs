//! Long-running recording-ingestion pipeline process (§6 "Command-line
//! surface"). Exit codes: `0` clean shutdown (including interrupt), `1`
//! config missing or unhandled error.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gamecam_pipeline::{Orchestrator, PipelineConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("gamecam=info".parse().unwrap()))
        .init();

    info!("starting gamecam-pipeline");

    let config_path = match PipelineConfig::find_config_file() {
        Some(path) => path,
        None => {
            error!("no config.ini found in current dir, binary dir, parent dir, or ./video_grouper/");
            std::process::exit(1);
        }
    };
    info!(path = %config_path.display(), "loaded config.ini");

    let config = match PipelineConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config.ini");
            std::process::exit(1);
        }
    };

    let orchestrator = match Orchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "refusing to start");
            std::process::exit(1);
        }
    };

    if let Err(e) = orchestrator.initialize().await {
        error!(error = %e, "failed to initialize pipeline");
        std::process::exit(1);
    }

    orchestrator.audit_once().await;

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    info!("received shutdown signal");

    orchestrator.shutdown().await;
    info!("gamecam-pipeline exited cleanly");
}
