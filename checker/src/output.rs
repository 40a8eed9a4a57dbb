use std::process::ExitCode;

use crate::errors::Error;
use crate::model::{FreshnessVerdict, PingVerdict, VariableSnapshot};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_UNHEALTHY: u8 = 2;

/// What an invocation prints and how it exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit: u8,
}

impl Report {
    pub fn emit(&self) -> ExitCode {
        if let Some(out) = &self.stdout {
            print!("{}", out);
        }
        if let Some(err) = &self.stderr {
            eprint!("{}", err);
        }
        ExitCode::from(self.exit)
    }
}

pub fn render_ping(device_id: &str, verdict: PingVerdict) -> Report {
    match verdict {
        PingVerdict::Healthy => Report {
            stdout: Some(format!("Device: {} Online: true Ok: true\n", device_id)),
            stderr: None,
            exit: EXIT_OK,
        },
        PingVerdict::Unhealthy { online, ok } => {
            let state = if online {
                "device reachable but not healthy"
            } else {
                "device not reachable"
            };
            Report {
                stdout: Some(format!(
                    "Device: {} Online: {} Ok: {} - {}\n",
                    device_id, online, ok, state
                )),
                stderr: None,
                exit: EXIT_UNHEALTHY,
            }
        }
    }
}

/// Monitoring line for a variable check. Stale values are still shown.
pub fn render_variable(
    device_id: &str,
    snapshot: &VariableSnapshot,
    verdict: &FreshnessVerdict,
) -> Report {
    let reading = &snapshot.reading;
    let mut line = format!(
        "Device: {} Variable: {} Value: {} Timestamp: {} Age: {}s",
        device_id,
        reading.name,
        reading.raw_value,
        snapshot.timestamp.timestamp(),
        verdict.age_seconds
    );
    if verdict.threshold_seconds > 0 {
        line.push_str(&format!(" Max: {}s", verdict.threshold_seconds));
    }

    let exit = if verdict.ok {
        line.push_str(" - OK");
        EXIT_OK
    } else {
        line.push_str(" - STALE");
        EXIT_UNHEALTHY
    };
    if let Some(reason) = &verdict.reason {
        line.push_str(&format!(" ({})", reason));
    }
    line.push('\n');

    Report {
        stdout: Some(line),
        stderr: None,
        exit,
    }
}

/// Graphite plaintext line, or nothing on stdout when the value is stale.
pub fn render_metric(
    metric_name: &str,
    snapshot: &VariableSnapshot,
    verdict: &FreshnessVerdict,
) -> Report {
    if !verdict.ok {
        let reason = verdict
            .reason
            .clone()
            .unwrap_or_else(|| format!("stale variable measurement: age {}s", verdict.age_seconds));
        return render_error(&Error::Stale(reason));
    }

    Report {
        stdout: Some(format!(
            "{} {} {}\n",
            metric_name,
            snapshot.reading.raw_value,
            snapshot.timestamp.timestamp()
        )),
        stderr: None,
        exit: EXIT_OK,
    }
}

pub fn render_error(err: &Error) -> Report {
    Report {
        stdout: None,
        stderr: Some(format!("error: {}\n", err)),
        exit: err.exit_code(),
    }
}
