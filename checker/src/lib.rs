//! Particle device checks: liveness ping, variable freshness verdicts and
//! Graphite metric lines, one snapshot per invocation.

pub mod check;
pub mod config;
pub mod decode;
pub mod errors;
pub mod freshness;
pub mod model;
pub mod output;
pub mod snapshot;
pub mod transport;

pub use check::{run, run_with};
pub use config::{Args, Config, Mode, VariableCheck};
pub use errors::{Error, Result};
pub use output::Report;
