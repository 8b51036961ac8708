//! Log subscriber setup. Logs go to stderr so walkthrough output on stdout
//! stays readable.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::error::{DemoError, Result};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "MEMORA_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. `verbose` lowers the default level to
/// `trace` when no filter is set in the environment.
pub fn init(format: LogFormat, verbose: bool) -> Result<()> {
    let default = if verbose { "memora_core=trace,info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| DemoError::Logging {
        message: err.to_string(),
    })
}
