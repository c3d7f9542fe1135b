//! Per-host server coordinator.
//!
//! Pulls chunks from client coordinators on demand, fairly interleaving
//! chunks across concurrent jobs, runs them across a supervised worker pool
//! sized to the local CPU count, retries bounded times on worker failure,
//! and runs per-job pre/post side effects exactly once. See
//! [`server::coordinator::CoordinatorActor`] for the event loop and
//! [`server::coordinator::CoordinatorHandle`] for the public API.

pub mod server;

pub use server::backlog::{Backlog, DispatchResult};
pub use server::config::{CliArgs, CoordinatorConfig};
pub use server::coordinator::{
    ChangeWorkerNumberReply, CoordinatorActor, CoordinatorHandle, CoordinatorMsg,
    SetNumChunksReply, DEFAULT_NUM_CHUNKS,
};
pub use server::protocol::{ClientHandle, ClusterRegistry, CpuCounter, SystemCpuCounter};
pub use server::supervisor::{CalcId, WorkerOutcome, MAX_ATTEMPTS};
