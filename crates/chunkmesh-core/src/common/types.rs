//! # Chunk and identity types
//!
//! This module defines the wire-shaped data that flows between a client
//! coordinator and a server coordinator: [`Chunk`] on the way in, [`OutputChunk`]
//! on the way out, plus the opaque identity newtypes ([`ClientId`], [`ServerId`],
//! [`JobRef`]) the coordinator keys its tables by.
//!
//! ## Datum representation
//!
//! The original protocol carries opaque, client-defined input/output values.
//! We represent those as [`Datum`], a `serde_json::Value`, so chunks remain
//! `Serialize`/`Deserialize` regardless of what a particular cluster's
//! calculation actually operates on.

use crate::Calc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of a client coordinator, unique within a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Identity of a server coordinator, unique within a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

/// Opaque job reference, unique per client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRef(pub String);

/// Sequence number of a chunk within a job.
pub type Seq = u64;

/// An opaque input or output value. Chunks carry a sequence of these; the
/// calculator is the only party that interprets their shape.
pub type Datum = serde_json::Value;

/// Tag used to mark a permanently failed output element, mirroring the
/// `CALCFAILMESSAGE` sentinel from the source protocol.
pub const CALCFAILMESSAGE: &str = "calc_failed";

/// The outcome of calculating a single datum.
///
/// A chunk's output preserves the input length by filling every position with
/// one of these, never omitting a slot even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CalcOutcome {
    /// The calculator produced a result for this position.
    Ok(Datum),
    /// This position failed permanently. `reason` is a human-readable cause;
    /// the `CALCFAILMESSAGE` tag is implicit in the variant itself.
    Fail { reason: String },
}

/// A unit of work pulled from a client coordinator's backlog.
///
/// Immutable once received: the coordinator never mutates a chunk's `data`,
/// only moves it between the backlog, a worker, and (on permanent failure) a
/// synthesized [`OutputChunk`].
#[derive(Clone)]
pub struct Chunk {
    pub client: ClientId,
    pub job_ref: JobRef,
    pub seq: Seq,
    /// Runs once per `(client, job_ref)`, synchronously, before the first
    /// chunk of that job is dispatched. `None` if the job has no setup step.
    pub pre: Option<Arc<dyn crate::SideEffect>>,
    /// The per-datum calculation. Every chunk carries its own, mirroring the
    /// `(module, function, args)` triple of the source protocol.
    pub calc: Arc<dyn Calc>,
    /// Runs once per `(client, job_ref)`, detached, at `job_cleanup`. `None`
    /// if the job has no teardown step.
    pub post: Option<Arc<dyn crate::SideEffect>>,
    pub data: Vec<Datum>,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("client", &self.client)
            .field("job_ref", &self.job_ref)
            .field("seq", &self.seq)
            .field("data_len", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Result of computing one [`Chunk`], sent back to the originating client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub job_ref: JobRef,
    pub seq: Seq,
    pub out_data: Vec<CalcOutcome>,
}

impl OutputChunk {
    /// Synthesizes a permanent-failure output chunk: every position is marked
    /// failed with the same `reason`, preserving the input length.
    pub fn all_failed(job_ref: JobRef, seq: Seq, len: usize, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            job_ref,
            seq,
            out_data: (0..len)
                .map(|_| CalcOutcome::Fail {
                    reason: reason.clone(),
                })
                .collect(),
        }
    }
}
