//! Per-job pre/post side-effect bookkeeping.
//!
//! Tracks which `(client, job_ref)` pairs have already run their pre-hook, so
//! a job's setup step runs at most once per server lifetime regardless of how
//! many batches arrive for it before cleanup.

use chunkmesh_core::{ClientId, JobRef, SideEffect};
use std::collections::HashSet;
use std::sync::Arc;

/// The processed-jobs set: `(client, job_ref) -> "pre-calc done"`.
#[derive(Default)]
pub struct ProcessedJobs {
    marked: HashSet<(ClientId, JobRef)>,
}

impl ProcessedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_marked(&self, client: &ClientId, job_ref: &JobRef) -> bool {
        self.marked.contains(&(client.clone(), job_ref.clone()))
    }

    pub fn mark(&mut self, client: ClientId, job_ref: JobRef) {
        self.marked.insert((client, job_ref));
    }

    /// Erases the marker, reporting whether one was present.
    pub fn unmark(&mut self, client: &ClientId, job_ref: &JobRef) -> bool {
        self.marked.remove(&(client.clone(), job_ref.clone()))
    }
}

/// Runs `pre` on first sighting of `(client, job_ref)` and marks it processed.
///
/// If `pre` is the empty sentinel (`None`), the hook is skipped and the
/// marker is deliberately left unset: a later chunk for the same job will
/// re-enter this branch and observe `None` again. This mirrors the source
/// protocol's documented behaviour rather than "fixing" it — see the
/// corresponding open question.
pub async fn run_pre_hook_if_needed(
    processed: &mut ProcessedJobs,
    client: &ClientId,
    job_ref: &JobRef,
    pre: Option<&Arc<dyn SideEffect>>,
) {
    if processed.is_marked(client, job_ref) {
        return;
    }
    if let Some(hook) = pre {
        hook.call().await;
        processed.mark(client.clone(), job_ref.clone());
    }
}

/// Dispatches `post` detached so its duration never stalls the event loop.
/// A no-op if `post` is the empty sentinel.
pub fn dispatch_post_hook(post: Option<Arc<dyn SideEffect>>) {
    if let Some(hook) = post {
        tokio::spawn(async move {
            hook.call().await;
        });
    }
}
