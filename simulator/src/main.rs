use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use particle_sim::{simulation, Cloud, SimulatedDevice};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Simulated Particle Device Cloud for exercising particle-check locally
#[derive(Parser, Debug)]
#[command(name = "particle-sim", version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SIM_ADDR", default_value = "127.0.0.1:8080")]
    addr: String,

    /// Access token clients must present
    #[arg(long, env = "SIM_TOKEN", default_value = "sim-token", hide_env_values = true)]
    token: String,

    /// Number of simulated devices
    #[arg(long, env = "SIM_DEVICES", default_value_t = 3)]
    devices: usize,

    /// Product ID the devices are claimed into
    #[arg(long, env = "SIM_PRODUCT_ID")]
    product: Option<String>,

    /// Milliseconds between simulated readings
    #[arg(long, env = "SIM_PERIOD_MS", default_value_t = 5000)]
    period_ms: u64,

    /// Seconds each measurement's timestamp lags behind real time
    #[arg(long, env = "SIM_LAG_SECS", default_value_t = 0)]
    lag_secs: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Particle cloud simulator");
    info!("Period: {}ms, Lag: {}s", args.period_ms, args.lag_secs);

    let mut cloud = Cloud::new(args.token);
    for i in 0..args.devices {
        let mut device = SimulatedDevice::new(format!("sim-device-{}", i)).with_lag(args.lag_secs);
        if let Some(product) = &args.product {
            device = device.with_product(product.clone());
        }
        cloud.insert(device);
    }
    info!("Simulating {} devices", cloud.len());
    let cloud = cloud.shared();

    // Seed readings so every variable exists before the first request
    simulation::tick(&cloud).await;

    let simulation_cloud = cloud.clone();
    let period = Duration::from_millis(args.period_ms.max(1));
    let simulation_handle = tokio::spawn(async move {
        simulation::run_simulation(simulation_cloud, period).await;
    });

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind to {}", args.addr))?;
    info!("HTTP server listening on {}", args.addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = particle_sim::serve(listener, cloud).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = simulation_handle => {
            error!("Simulation task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}
