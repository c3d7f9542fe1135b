//! External collaborator interfaces.
//!
//! Everything in this module is a trait boundary around a collaborator that
//! is out of scope for this crate: the client coordinator, the cluster
//! registry, and CPU-count enumeration. The coordinator only ever talks to
//! these through their interface; production wiring and the wire transport
//! that backs [`ClientHandle`] in a real cluster live elsewhere.

use chunkmesh_core::{ClientId, Error, OutputChunk, ServerId};
use std::future::Future;

/// A reference to a client coordinator, used to push pull requests and
/// results back to it.
///
/// Cloning a handle must be cheap: the coordinator keeps one per known
/// client and clones it into dispatch/worker tasks freely.
pub trait ClientHandle: Clone + Send + Sync + 'static {
    /// Stable identity of the client this handle addresses.
    fn id(&self) -> ClientId;

    /// Startup broadcast: tells the client a new compute resource is
    /// available.
    fn server_up(&self, server: ServerId) -> impl Future<Output = ()> + Send;

    /// Pull request: asks the client for up to `n` more chunks.
    fn send_chunks(&self, server: ServerId, n: usize) -> impl Future<Output = ()> + Send;

    /// Result delivery. Used by the coordinator only for synthesized
    /// permanent-failure chunks; successful chunks are sent by the worker
    /// (standing in for the calculator) directly.
    fn calc_done(&self, out: OutputChunk) -> impl Future<Output = ()> + Send;
}

/// The cluster registry: names coordinators and enumerates clients of a
/// cluster.
pub trait ClusterRegistry: Send + Sync + 'static {
    type Client: ClientHandle;

    /// Registers `server` under `cluster`. Failure here is fatal to startup.
    fn register_server(
        &self,
        cluster: &str,
        server: ServerId,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Enumerates the clients currently registered to `cluster`. An empty
    /// result is not an error: late-joining clients learn of the server
    /// through their own discovery.
    fn get_clients(
        &self,
        cluster: &str,
    ) -> impl Future<Output = Result<Vec<Self::Client>, Error>> + Send;
}

/// CPU-count enumeration, used to size the initial worker pool.
pub trait CpuCounter: Send + Sync + 'static {
    fn cpu_count(&self) -> Result<usize, Error>;
}

/// Default [`CpuCounter`] backed by the `num_cpus` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCpuCounter;

impl CpuCounter for SystemCpuCounter {
    fn cpu_count(&self) -> Result<usize, Error> {
        let n = num_cpus::get();
        if n == 0 {
            return Err(Error::CpuDiscoveryFailed(
                "reported CPU count was zero".to_string(),
            ));
        }
        Ok(n)
    }
}
