//! # The per-datum calculation
//!
//! `calc` is the user-supplied function a chunk asks the calculator to apply
//! to each element of its `data`. The source protocol represents it as a
//! `(module, function, args)` triple resolved reflectively; here it is a typed
//! object so the coordinator never has to parse or validate a descriptor.

use crate::Datum;
use std::future::Future;
use std::pin::Pin;

/// A per-datum calculation, invoked once per element of a chunk's `data`.
///
/// Implementations run inside the worker task that stands in for the
/// "calculator" collaborator. A returned `Err` marks that single position as
/// permanently failed without aborting the rest of the chunk; a panic inside
/// `call` is instead treated as abnormal worker termination (see the
/// supervisor), which retries the *whole* chunk.
pub trait Calc: Send + Sync + 'static {
    fn call(&self, input: Datum) -> Pin<Box<dyn Future<Output = Result<Datum, String>> + Send>>;
}

struct FnCalc<F>(F);

impl<F, Fut> Calc for FnCalc<F>
where
    F: Fn(Datum) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Datum, String>> + Send + 'static,
{
    fn call(&self, input: Datum) -> Pin<Box<dyn Future<Output = Result<Datum, String>> + Send>> {
        Box::pin((self.0)(input))
    }
}

/// Wraps a plain async closure as a [`Calc`], the way `tower::service_fn`
/// wraps a closure as a `Service`.
pub fn calc_fn<F, Fut>(f: F) -> std::sync::Arc<dyn Calc>
where
    F: Fn(Datum) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Datum, String>> + Send + 'static,
{
    std::sync::Arc::new(FnCalc(f))
}
