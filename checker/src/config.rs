use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::warn;

use crate::errors::{Error, Result};
use crate::model::DeviceTarget;

pub const DEFAULT_API_URL: &str = "https://api.particle.io/v1/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_METRIC_MAX_AGE_SECS: i64 = 60;

/// Particle device checks for monitoring and metrics collection
#[derive(Parser, Debug)]
#[command(name = "particle-check", version)]
pub struct Args {
    /// Enable verbose output on stderr (URLs, responses, device info)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ping the device and check that it is online and healthy
    Ping {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Read a variable and report whether its value is fresh
    Variable {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        variable: VariableArgs,

        /// Maximum age of the measurement in seconds, 0 disables the check
        #[arg(short = 'T', long, default_value_t = 0, allow_negative_numbers = true)]
        max_age: i64,
    },

    /// Read a variable and print it as a Graphite plaintext metric
    Metric {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        variable: VariableArgs,

        /// Maximum age of the measurement in seconds, 0 disables the check
        #[arg(
            short = 'T',
            long,
            default_value_t = DEFAULT_METRIC_MAX_AGE_SECS,
            allow_negative_numbers = true
        )]
        max_age: i64,

        /// Metric name, defaults to <hostname>.<variable>
        #[arg(short, long, env = "PARTICLE_METRIC_NAME")]
        metric: Option<String>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct TargetArgs {
    /// Particle device ID
    #[arg(short, long, env = "PARTICLE_DEVICE_ID")]
    pub device: String,

    /// Particle access token
    #[arg(
        short,
        long,
        visible_alias = "access_token",
        env = "PARTICLE_ACCESS_TOKEN",
        hide_env_values = true
    )]
    pub access_token: String,

    /// Particle product ID, for product fleet devices
    #[arg(short, long, env = "PARTICLE_PRODUCT_ID")]
    pub product: Option<String>,

    /// Device cloud API base URL
    #[arg(long, env = "PARTICLE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PARTICLE_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,
}

#[derive(ClapArgs, Debug)]
pub struct VariableArgs {
    /// Variable name
    #[arg(short, long)]
    pub variable: String,

    /// Variable holding the measurement time as Unix epoch seconds
    #[arg(short, long)]
    pub timestamp: Option<String>,

    /// Validate the configuration without contacting the device
    #[arg(long)]
    pub dry_run: bool,
}

/// Everything one invocation needs, built once from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub target: DeviceTarget,
    pub api_base: String,
    pub request_timeout: Duration,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Ping,
    Variable(VariableCheck),
    Metric {
        check: VariableCheck,
        metric_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableCheck {
    pub variable: String,
    pub timestamp_variable: Option<String>,
    /// Zero when the freshness check is disabled.
    pub max_age_seconds: i64,
    pub dry_run: bool,
}

impl Args {
    pub fn into_config(self) -> Result<Config> {
        match self.command {
            Command::Ping { target } => build_config(target, Mode::Ping),
            Command::Variable {
                target,
                variable,
                max_age,
            } => {
                let check = variable_check(variable, max_age)?;
                build_config(target, Mode::Variable(check))
            }
            Command::Metric {
                target,
                variable,
                max_age,
                metric,
            } => {
                let check = variable_check(variable, max_age)?;
                let metric_name = match metric.filter(|m| !m.trim().is_empty()) {
                    Some(name) => name,
                    None => default_metric_name(&check.variable),
                };
                build_config(target, Mode::Metric { check, metric_name })
            }
        }
    }
}

fn build_config(args: TargetArgs, mode: Mode) -> Result<Config> {
    let device_id = required("device", args.device)?;
    let credential = required("access token", args.access_token)?;
    let api_base = required("API URL", args.api_url)?;

    if args.request_timeout == 0 {
        return Err(Error::Config(
            "request timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(Config {
        target: DeviceTarget {
            device_id,
            product_id: args.product.filter(|p| !p.trim().is_empty()),
            credential,
        },
        api_base,
        request_timeout: Duration::from_secs(args.request_timeout),
        mode,
    })
}

fn variable_check(args: VariableArgs, max_age: i64) -> Result<VariableCheck> {
    Ok(VariableCheck {
        variable: required("variable", args.variable)?,
        timestamp_variable: args.timestamp.filter(|t| !t.trim().is_empty()),
        max_age_seconds: max_age.max(0),
        dry_run: args.dry_run,
    })
}

fn required(what: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", what)));
    }
    Ok(value)
}

/// `<hostname>.<variable>`
pub fn default_metric_name(variable: &str) -> String {
    let host = match hostname::get().map(|h| h.into_string()) {
        Ok(Ok(host)) => host,
        _ => {
            warn!("Could not determine local hostname, using \"localhost\"");
            "localhost".to_string()
        }
    };
    format!("{}.{}", host, variable)
}
