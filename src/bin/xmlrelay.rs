//! Runs the relay stage over a file spool.
//!
//! Usage:
//!
//! ```text
//! XMLRELAY_CONNECTION=spool:///var/spool/xmlrelay \
//! XMLRELAY_INPUT_QUEUE=inbound \
//! XMLRELAY_OUTPUT_QUEUE=outbound \
//! XMLRELAY_ERROR_QUEUE=errors \
//! xmlrelay --poll-interval-ms 500
//! ```
//!
//! Without a poll interval the input channel is drained once and the
//! process exits. With one, it polls until interrupted.

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use xmlrelay::config::{RelayConfig, ValidatedConfig};
use xmlrelay::relay::{
    services::{DrainReport, RelayWorker, XmlRelayProcessor},
    validation::SchemaValidator,
};
use xmlrelay::telemetry;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = RelayConfig::parse();
    telemetry::init(args.log_format);

    let config = args.validate()?;
    let report = run(&config).await?;
    info!(
        received = report.received,
        published = report.published,
        error_routed = report.error_routed,
        records_lost = report.records_lost,
        abandoned = report.abandoned,
        unsettled = report.unsettled,
        "relay finished"
    );
    Ok(())
}

async fn run(config: &ValidatedConfig) -> Result<DrainReport, BoxError> {
    let schema = config.load_schema()?;
    let spool = config.open_spool()?;
    let source = Arc::new(spool.source(&config.input_queue)?);
    let output = Arc::new(spool.channel(&config.output_queue)?);
    let policy = config.error_policy(&spool)?;

    info!(
        schema = %config.schema_path,
        input = %config.input_queue,
        output = %config.output_queue,
        fail_open = config.is_fail_open(),
        "relay starting"
    );

    let processor = Arc::new(XmlRelayProcessor::new(
        Arc::new(SchemaValidator::new(Arc::new(schema))),
        output,
        policy,
        config.target_namespace.clone(),
        Arc::new(mockable::DefaultClock),
    ));
    let worker = RelayWorker::new(source, processor, config.max_in_flight);

    let report = match config.poll_interval {
        Some(interval) => worker.run(interval, shutdown_signal()).await?,
        None => worker.drain().await?,
    };
    Ok(report)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
