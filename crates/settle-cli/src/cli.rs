use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "settle",
    about = "Settle: run settlable scenarios on a single-threaded event loop",
    version
)]
pub struct Cli {
    /// Path to a JSON LoopConfig (missing keys keep their defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fulfill with `start`, then add one in each of `links` continuations
    Chain {
        #[arg(long, default_value_t = 1)]
        start: i64,

        #[arg(long, default_value_t = 1)]
        links: usize,
    },

    /// Reject with `reason` and recover it into a fulfillment
    Recover {
        #[arg(long, default_value = "x")]
        reason: String,
    },

    /// Assimilate a thenable that calls its fulfillment callback twice
    Thenable,

    /// Settle a deferred from a tokio timer and await it
    Deferred {
        #[arg(long, default_value_t = 10)]
        delay_ms: u64,

        #[arg(long, default_value_t = 7)]
        value: i64,
    },

    /// Resolve a settlable with itself and report the defect
    Cycle,
}
