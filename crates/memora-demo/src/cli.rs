use std::io::Write;

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::logging::{self, LogFormat};
use crate::scenarios;

#[derive(Debug, Parser)]
#[command(
    name = "memora-demo",
    about = "Walkthroughs of per-instance memoization with TTL and dependency invalidation",
    version
)]
pub struct Cli {
    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Trace cache hits, misses and invalidations.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Cache an expensive calculation.
    Basic,

    /// Expire a reading after its TTL.
    Ttl(TtlArgs),

    /// Clear cached members when their dependencies change.
    #[command(name = "clear-on")]
    ClearOn,

    /// Chained memoized members on a shopping cart.
    Cart,

    /// Run every walkthrough in order.
    All(TtlArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TtlArgs {
    /// Time-to-live of the cached reading, in milliseconds.
    #[arg(long, default_value_t = scenarios::DEFAULT_TTL_MS, env = "MEMORA_TTL_MS")]
    pub ttl_ms: u64,

    /// Simulated wait before the final reading, in milliseconds.
    #[arg(long, default_value_t = scenarios::DEFAULT_WAIT_MS)]
    pub wait_ms: u64,
}

impl Default for TtlArgs {
    fn default() -> Self {
        Self {
            ttl_ms: scenarios::DEFAULT_TTL_MS,
            wait_ms: scenarios::DEFAULT_WAIT_MS,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose)?;
    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}

pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::Basic => scenarios::basic(out),
        Commands::Ttl(args) => scenarios::ttl(out, &args),
        Commands::ClearOn => scenarios::clear_on(out),
        Commands::Cart => scenarios::cart(out),
        Commands::All(args) => {
            scenarios::basic(out)?;
            scenarios::ttl(out, &args)?;
            scenarios::clear_on(out)?;
            scenarios::cart(out)
        }
    }
}
