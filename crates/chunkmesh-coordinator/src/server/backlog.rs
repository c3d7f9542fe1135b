//! The backlog and its fair round-robin dispatcher.
//!
//! A [`Backlog`] is an ordered sequence of batches, one per `process_chunks`
//! arrival. New batches are appended so arrival order is preserved at the
//! head of the backlog; the dispatcher then rotates batches to the tail as it
//! consumes them, which is what actually produces fairness — a touched batch
//! falls in behind every other job currently waiting instead of keeping its
//! place at the front.

use chunkmesh_core::{Chunk, ClientId};
use std::collections::VecDeque;

struct JobBatch {
    client: ClientId,
    chunks: VecDeque<Chunk>,
}

/// Chunks pulled from the backlog by one dispatch pass, plus the clients
/// whose batch was fully drained and therefore owe a refill request.
pub struct DispatchResult {
    pub chunks: Vec<Chunk>,
    pub refills: Vec<ClientId>,
}

/// Ordered sequence of pending chunk batches.
#[derive(Default)]
pub struct Backlog {
    batches: VecDeque<JobBatch>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Appends a newly arrived batch behind whatever is already waiting, so
    /// arrival order is preserved. An empty batch is a no-op, per the
    /// `process_chunks` contract.
    pub fn push_batch(&mut self, client: ClientId, chunks: Vec<Chunk>) {
        if chunks.is_empty() {
            return;
        }
        self.batches.push_back(JobBatch {
            client,
            chunks: chunks.into(),
        });
    }

    /// Pulls up to `n` chunks, round-robin across batches.
    ///
    /// Walks the backlog taking one chunk at a time from the head batch. If
    /// that leaves the batch empty, the batch is dropped and its client is
    /// recorded as owing a refill of `num_chunks` more; otherwise the batch
    /// rotates to the tail so the next chunk taken comes from a different
    /// job. Stops once `n` chunks have been pulled or the backlog is empty.
    pub fn dispatch(&mut self, n: usize) -> DispatchResult {
        let mut chunks = Vec::with_capacity(n);
        let mut refills = Vec::new();

        while chunks.len() < n {
            let Some(mut batch) = self.batches.pop_front() else {
                break;
            };
            // Invariant: no batch in the deque is ever empty (push_batch
            // refuses empty batches, and we never push one back below).
            let chunk = batch
                .chunks
                .pop_front()
                .expect("backlog never holds an empty batch");
            chunks.push(chunk);

            if batch.chunks.is_empty() {
                refills.push(batch.client);
            } else {
                self.batches.push_back(batch);
            }
        }

        DispatchResult { chunks, refills }
    }
}
