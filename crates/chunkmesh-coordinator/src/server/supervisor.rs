//! Supervised worker execution and bounded retry.
//!
//! Each worker is spawned with a one-to-one monitor, mirroring a supervised
//! process with a linked monitor in the source protocol: the worker task
//! itself stands in for the calculator and talks to the client directly on
//! success, while a second task awaits its `JoinHandle` and reports the
//! termination reason back to the coordinator's event loop. A panic inside
//! the worker surfaces here as `Err(JoinError)` — the Rust analogue of an
//! abnormal process exit.

use chunkmesh_core::{CalcOutcome, Chunk, OutputChunk};
use tokio::sync::mpsc;

use crate::server::protocol::ClientHandle;

/// Bounded retry count: a chunk is attempted at most `MAX_ATTEMPTS + 1` times
/// in total (the initial attempt plus `MAX_ATTEMPTS` retries).
pub const MAX_ATTEMPTS: u8 = 2;

/// Identity of one supervised calculation, unique for the coordinator's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalcId(pub u64);

/// In-flight table entry: what's needed to retry a chunk if its worker dies
/// abnormally.
pub struct InFlightEntry {
    pub attempt: u8,
    pub chunk: Chunk,
}

/// Why a supervised worker terminated.
pub enum WorkerOutcome {
    /// The worker ran to completion and already delivered `calc_done` to the
    /// client itself.
    Normal,
    /// The worker task panicked before it could deliver a result. Carries the
    /// panic's displayed reason.
    Abnormal(String),
}

/// Termination report delivered to the coordinator's event loop.
pub struct WorkerDown {
    pub calc_id: CalcId,
    pub outcome: WorkerOutcome,
}

/// Spawns a supervised worker for `chunk` and a monitor that reports its
/// termination back through `report`.
///
/// The worker computes every datum in the chunk and sends the resulting
/// [`OutputChunk`] to `client` directly — this is the calculator's job, which
/// the worker stands in for. The monitor never touches the chunk; it only
/// watches the worker's `JoinHandle`.
pub fn spawn_worker<Cl: ClientHandle>(
    calc_id: CalcId,
    chunk: Chunk,
    client: Cl,
    report: mpsc::Sender<WorkerDown>,
) {
    let handle = tokio::spawn(run_worker(chunk, client));

    tokio::spawn(async move {
        let outcome = match handle.await {
            Ok(()) => WorkerOutcome::Normal,
            Err(join_err) => WorkerOutcome::Abnormal(join_err.to_string()),
        };
        let _ = report.send(WorkerDown { calc_id, outcome }).await;
    });
}

async fn run_worker<Cl: ClientHandle>(chunk: Chunk, client: Cl) {
    let mut out_data = Vec::with_capacity(chunk.data.len());
    for datum in chunk.data.iter().cloned() {
        match chunk.calc.call(datum).await {
            Ok(value) => out_data.push(CalcOutcome::Ok(value)),
            Err(reason) => out_data.push(CalcOutcome::Fail { reason }),
        }
    }

    let output = OutputChunk {
        job_ref: chunk.job_ref.clone(),
        seq: chunk.seq,
        out_data,
    };
    client.calc_done(output).await;
}
