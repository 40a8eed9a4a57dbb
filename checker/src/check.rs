use chrono::Utc;
use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::errors::Result;
use crate::freshness::{evaluate, evaluate_ping};
use crate::output::{render_error, render_metric, render_ping, render_variable, Report};
use crate::snapshot::SnapshotBuilder;
use crate::transport::{HttpTransport, Transport};

/// Runs one check over HTTPS and decides what to print and how to exit.
pub async fn run(config: &Config) -> Report {
    match HttpTransport::new(config.request_timeout) {
        Ok(transport) => run_with(&transport, config).await,
        Err(e) => render_error(&e),
    }
}

/// Single point where every outcome, good or bad, becomes a report.
pub async fn run_with<T: Transport>(transport: &T, config: &Config) -> Report {
    match dispatch(transport, config).await {
        Ok(report) => report,
        Err(e) => {
            debug!("Check failed: {:?}", e);
            render_error(&e)
        }
    }
}

async fn dispatch<T: Transport>(transport: &T, config: &Config) -> Result<Report> {
    let device_id = config.target.device_id.as_str();
    let builder = SnapshotBuilder::new(transport, &config.target, &config.api_base);

    match &config.mode {
        Mode::Ping => {
            info!("Pinging device {}", device_id);
            let status = builder.ping().await?;
            Ok(render_ping(device_id, evaluate_ping(status)))
        }
        Mode::Variable(check) => {
            let snapshot = builder
                .build(
                    &check.variable,
                    check.timestamp_variable.as_deref(),
                    check.dry_run,
                )
                .await?;
            let verdict = evaluate(&snapshot, check.max_age_seconds, Utc::now());
            Ok(render_variable(device_id, &snapshot, &verdict))
        }
        Mode::Metric { check, metric_name } => {
            let snapshot = builder
                .build(
                    &check.variable,
                    check.timestamp_variable.as_deref(),
                    check.dry_run,
                )
                .await?;
            let verdict = evaluate(&snapshot, check.max_age_seconds, Utc::now());
            Ok(render_metric(metric_name, &snapshot, &verdict))
        }
    }
}
