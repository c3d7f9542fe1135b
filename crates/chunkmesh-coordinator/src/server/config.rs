//! Binary-only CLI surface for the coordinator.
//!
//! Mirrors the existing `clap`-derive, `env`-backed CLI convention in this
//! codebase: every field reads from a flag or an environment variable, and
//! fallible validation happens once, in `TryFrom<CliArgs>`, before the
//! runtime config is built.

use anyhow::bail;
use clap::Parser;

use crate::server::coordinator::DEFAULT_NUM_CHUNKS;

/// Runtime configuration for the `chunkmesh-coordinator` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chunkmesh-coordinator",
    version,
    about = "Per-host server coordinator: pulls chunks from clients and runs them across a supervised worker pool"
)]
pub struct CliArgs {
    /// Name of the cluster to register under and discover clients in.
    ///
    /// Environment variable: `CLUSTER_NAME`
    #[arg(long, env = "CLUSTER_NAME", default_value = "default")]
    pub cluster_name: String,

    /// Overrides the initial worker pool cap. Defaults to the detected CPU
    /// count when unset (`0` means "use detected CPU count").
    ///
    /// Environment variable: `MAX_WORKERS`
    ///
    /// Default: `0`
    #[arg(long, env = "MAX_WORKERS", default_value_t = 0)]
    pub max_workers: usize,

    /// Number of chunks requested per pull (`send_chunks`).
    ///
    /// Environment variable: `NUM_CHUNKS`
    #[arg(long, env = "NUM_CHUNKS", default_value_t = DEFAULT_NUM_CHUNKS)]
    pub num_chunks: usize,

    /// Maximum time (in seconds) to wait for in-flight workers to drain
    /// during shutdown before exiting anyway.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    ///
    /// Default: `3`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: usize,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub cluster_name: String,
    /// `None` means "use the detected CPU count".
    pub max_workers_override: Option<usize>,
    pub num_chunks: usize,
    pub shutdown_timeout: usize,
}

impl TryFrom<CliArgs> for CoordinatorConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_chunks == 0 {
            bail!("NUM_CHUNKS must be greater than 0");
        }
        if args.cluster_name.trim().is_empty() {
            bail!("CLUSTER_NAME must not be empty");
        }

        Ok(Self {
            cluster_name: args.cluster_name,
            max_workers_override: if args.max_workers == 0 {
                None
            } else {
                Some(args.max_workers)
            },
            num_chunks: args.num_chunks,
            shutdown_timeout: args.shutdown_timeout,
        })
    }
}
