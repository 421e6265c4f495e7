use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, field, warn};

/// Records the trade's ticker and broker on the current submission span.
pub fn annotate_span(ticker: &str, broker_id: i64) {
    let span = Span::current();
    span.record("ticker", field::display(ticker));
    span.record("broker_id", broker_id);
}

/// Awaits `fut` and logs under the `store` target when it overruns `budget`.
/// Used around every storage round trip; the output passes through untouched.
pub async fn warn_if_slow<F, T>(op: &'static str, budget: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let out = fut.await;

    let elapsed = started.elapsed();
    if elapsed > budget {
        warn!(
            target: "store",
            op,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "slow storage call"
        );
    }
    out
}
