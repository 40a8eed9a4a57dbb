use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::device::{generate_reading, SharedCloud};
use crate::metrics::{DEVICES_ONLINE, READINGS_TOTAL};

/// Records a new reading on every online device once per `period`.
pub async fn run_simulation(cloud: SharedCloud, period: Duration) {
    info!("Starting simulation with period={:?}", period);

    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        let recorded = tick(&cloud).await;
        debug!("Recorded {} readings", recorded);
    }
}

/// One simulation step. Returns how many devices took a reading.
pub async fn tick(cloud: &SharedCloud) -> usize {
    let now = Utc::now();
    let mut cloud = cloud.write().await;
    // ThreadRng is not Send, so it must not live across the await above.
    let mut rng = rand::thread_rng();

    let mut recorded = 0;
    for device in cloud.devices_mut().filter(|d| d.online) {
        let reading = generate_reading(&mut rng);
        device.record(&reading, now);
        recorded += 1;
    }

    READINGS_TOTAL.inc_by(recorded as u64);
    DEVICES_ONLINE.set(cloud.online_count() as i64);
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Cloud, SimulatedDevice};

    #[test]
    fn test_tick_skips_offline_devices() {
        tokio_test::block_on(async {
            let mut cloud = Cloud::new("token");
            cloud.insert(SimulatedDevice::new("up"));
            cloud.insert(SimulatedDevice::new("down").offline());
            let cloud = cloud.shared();

            assert_eq!(tick(&cloud).await, 1);

            let cloud = cloud.read().await;
            assert!(cloud.device(None, "up").unwrap().variable("temperature").is_some());
            assert!(cloud.device(None, "down").unwrap().variable("temperature").is_none());
        });
    }
}
