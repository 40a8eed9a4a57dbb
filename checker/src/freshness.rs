use chrono::{DateTime, Utc};

use crate::model::{FreshnessVerdict, PingStatus, PingVerdict, VariableSnapshot};

/// Decides whether a snapshot is recent enough.
///
/// A threshold of zero or less disables the check. A timestamp in the future
/// is clock skew between device and host, not staleness, and passes.
pub fn evaluate(
    snapshot: &VariableSnapshot,
    threshold_seconds: i64,
    now: DateTime<Utc>,
) -> FreshnessVerdict {
    let age_seconds = (now - snapshot.timestamp).num_seconds();

    let (ok, reason) = if threshold_seconds <= 0 {
        (true, None)
    } else if age_seconds < 0 {
        (
            true,
            Some(format!(
                "measurement timestamp is {}s ahead of local clock",
                -age_seconds
            )),
        )
    } else if age_seconds <= threshold_seconds {
        (true, None)
    } else {
        (
            false,
            Some(format!(
                "stale variable measurement: {} - {} = {}",
                now.timestamp(),
                snapshot.timestamp.timestamp(),
                age_seconds
            )),
        )
    };

    FreshnessVerdict {
        ok,
        age_seconds,
        threshold_seconds,
        reason,
    }
}

pub fn evaluate_ping(status: PingStatus) -> PingVerdict {
    if status.online && status.ok {
        PingVerdict::Healthy
    } else {
        PingVerdict::Unhealthy {
            online: status.online,
            ok: status.ok,
        }
    }
}
