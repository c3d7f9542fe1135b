//! # Pre/post-calculation hooks
//!
//! The source protocol's `pre` and `post` side effects are `(module, function,
//! args)` triples, or an empty sentinel meaning "no hook". Rather than carry
//! that reflective descriptor (and a "malformed descriptor" error case that
//! only exists because the descriptor is untyped), a hook here is either
//! absent or a typed, already-resolved side effect — the coordinator only
//! ever needs to distinguish "present" from "absent" and invoke it.

use std::future::Future;
use std::pin::Pin;

/// A zero-argument side effect run once per `(client, job_ref)`.
///
/// The pre-hook is awaited synchronously, inline in the coordinator's event
/// handling. The post-hook is spawned detached so its duration never stalls
/// the coordinator.
pub trait SideEffect: Send + Sync + 'static {
    fn call(&self) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

struct FnSideEffect<F>(F);

impl<F, Fut> SideEffect for FnSideEffect<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin((self.0)())
    }
}

/// Wraps a plain async closure as a [`SideEffect`].
pub fn hook_fn<F, Fut>(f: F) -> std::sync::Arc<dyn SideEffect>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    std::sync::Arc::new(FnSideEffect(f))
}
