//! `chunkmesh-coordinator` binary entry point.
//!
//! Wires CLI parsing, logging, and graceful shutdown around
//! [`chunkmesh_coordinator::server::coordinator::CoordinatorActor`]. The
//! cluster registry and the client coordinators it discovers are external
//! collaborators this crate only depends on through their trait interfaces
//! ([`ClusterRegistry`], [`ClientHandle`]); the wire transport that would
//! back a production implementation of those traits is out of scope here.
//! [`LoopbackRegistry`] is a stand-in so the binary links and runs standalone
//! — an embedder wires a real registry/transport in its place.

use chunkmesh_coordinator::{
    CoordinatorActor, CoordinatorConfig, SystemCpuCounter,
};
use chunkmesh_coordinator::server::config::CliArgs;
use chunkmesh_coordinator::server::protocol::{ClientHandle, ClusterRegistry, CpuCounter};
use chunkmesh_coordinator::server::telemetry::init_tracing;
use chunkmesh_core::{ClientId, Error, OutputChunk, ServerId};
use clap::Parser;
use tokio::signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// A client handle with nothing on the other end. Never actually handed out
/// by [`LoopbackRegistry::get_clients`], which always enumerates to an empty
/// set, but required to give [`LoopbackRegistry`] a concrete `Client` type.
#[derive(Clone)]
struct NullClientHandle {
    id: ClientId,
}

impl ClientHandle for NullClientHandle {
    fn id(&self) -> ClientId {
        self.id.clone()
    }

    async fn server_up(&self, _server: ServerId) {}

    async fn send_chunks(&self, _server: ServerId, _n: usize) {}

    async fn calc_done(&self, _out: OutputChunk) {}
}

/// Stand-in cluster registry: registration always succeeds, and no clients
/// are ever enumerated. Per §4.1, an empty enumeration is not an error —
/// late-joining clients are expected to learn of the server through their
/// own discovery once a real registry/transport is wired in.
struct LoopbackRegistry;

impl ClusterRegistry for LoopbackRegistry {
    type Client = NullClientHandle;

    async fn register_server(&self, _cluster: &str, _server: ServerId) -> chunkmesh_core::Result<()> {
        Ok(())
    }

    async fn get_clients(&self, _cluster: &str) -> chunkmesh_core::Result<Vec<Self::Client>> {
        Ok(Vec::new())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CoordinatorConfig::try_from(args)?;

    init_tracing();

    let server_id = ServerId(format!("chunkmesh-coordinator-{}", std::process::id()));
    let cpu_counter = SystemCpuCounter;
    let max_workers = match config.max_workers_override {
        Some(n) => n,
        None => cpu_counter.cpu_count()?,
    };

    #[cfg(feature = "tracing")]
    tracing::info!(
        cluster = %config.cluster_name,
        max_workers,
        num_chunks = config.num_chunks,
        "starting coordinator"
    );

    let registry = LoopbackRegistry;
    let fixed_counter = FixedCpuCounter(max_workers);
    // Held until shutdown: dropping it closes the coordinator's message
    // channel and stops its event loop.
    let coordinator_handle = CoordinatorActor::spawn(
        server_id,
        &config.cluster_name,
        &registry,
        &fixed_counter,
        config.num_chunks,
    )
    .await?;

    shutdown_signal().await;

    #[cfg(feature = "tracing")]
    tracing::info!("shutdown signal received, closing the coordinator channel");

    // Dropping the handle closes the actor's message channel, which is the
    // only signal it reacts to on shutdown: per-spec, the coordinator never
    // joins its workers, so this grace period isn't a drain wait — it just
    // gives the actor loop and any detached post-hooks a moment to unwind
    // before the process exits regardless.
    drop(coordinator_handle);
    tokio::time::sleep(std::time::Duration::from_secs(config.shutdown_timeout as u64)).await;

    Ok(())
}

/// Wraps a pre-resolved worker count so [`CoordinatorActor::spawn`] (which
/// queries CPU count itself for the default case) can be handed the already
/// overridden-or-detected value uniformly.
struct FixedCpuCounter(usize);

impl CpuCounter for FixedCpuCounter {
    fn cpu_count(&self) -> chunkmesh_core::Result<usize> {
        if self.0 == 0 {
            return Err(Error::CpuDiscoveryFailed("resolved worker count was zero".to_string()));
        }
        Ok(self.0)
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("received SIGTERM signal");
        },
    }
}
