//! Bounded-concurrency batch execution.
//!
//! General-purpose throttle for independent async work (bulk image prefetch,
//! bulk store writes) so a burst of I/O never overwhelms the device or an OS
//! API. Results come back in input order; the first worker failure fails the
//! whole batch.

use anyhow::Result;
use futures_util::stream::{self, StreamExt};

/// Run `worker` over `items` with at most `concurrency` workers in flight.
///
/// Output order matches input order regardless of completion order. The
/// first error is propagated immediately and any remaining in-flight work is
/// dropped. Empty input returns empty output without invoking the worker.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, concurrency: usize, worker: F) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let concurrency = concurrency.max(1);
    let total = items.len();

    let mut in_flight = stream::iter(items.into_iter().enumerate().map(|(i, item)| {
        let fut = worker(item);
        async move { (i, fut.await) }
    }))
    .buffer_unordered(concurrency);

    let mut out: Vec<Option<R>> = Vec::with_capacity(total);
    out.resize_with(total, || None);

    while let Some((i, res)) = in_flight.next().await {
        out[i] = Some(res?);
    }

    Ok(out
        .into_iter()
        .map(|r| r.expect("every index yields exactly once"))
        .collect())
}
