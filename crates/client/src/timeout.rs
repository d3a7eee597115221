//! Bounded waiting on futures.

use std::future::Future;
use std::time::Duration;

/// The budget elapsed before the future resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no result within {0:?}")]
pub struct TimedOut(pub Duration);

/// Race `future` against `budget`; whichever finishes first wins.
///
/// When the budget wins, the future is abandoned: it is dropped without
/// being polled again and any result it would have produced is discarded.
/// Nothing is cancelled at the transport level; connection cleanup is left
/// to the transport's own timeout.
pub async fn with_timeout<F: Future>(future: F, budget: Duration) -> Result<F::Output, TimedOut> {
    tokio::time::timeout(budget, future).await.map_err(|_| TimedOut(budget))
}
