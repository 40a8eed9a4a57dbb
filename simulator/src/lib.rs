//! A small stand-in for the Particle Device Cloud: variable reads, pings and
//! Prometheus counters for a set of simulated devices.

pub mod api;
pub mod device;
pub mod metrics;
pub mod simulation;

pub use device::{Cloud, Reading, SharedCloud, SimulatedDevice, TIMESTAMP_VARIABLE};

use tokio::net::TcpListener;

/// Serves the API on an already-bound listener until the server stops.
pub async fn serve(listener: TcpListener, cloud: SharedCloud) -> std::io::Result<()> {
    metrics::init_metrics();
    axum::serve(listener, api::create_router(cloud)).await
}
