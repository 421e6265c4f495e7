//! Trade Ingestion Coordinator.
//!
//! Entry point for `SubmitTrade`. Validates the command, then drives the
//! repository's atomic attempt inside a bounded retry loop. This is the only
//! layer that decides between retrying and surfacing a storage failure:
//!
//! - `StoreError::Conflict` (lock contention) is retried with linear backoff
//!   until `max_attempts` is reached.
//! - any other `StoreError` is surfaced immediately.
//!
//! Every attempt is a fresh transaction, so a failed or cancelled attempt
//! leaves nothing behind. Submissions are not idempotent: each successful
//! call appends a new ledger entry.

use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, child_span, root_span};
use tracing::{Instrument, error, info, instrument, warn};

use crate::error::{StoreError, TradeError};
use crate::logger::annotate_span;
use crate::trade::model::{LedgerEntry, RecordedTrade, TickerSymbol, TradeCommand, ValidTrade};
use crate::trade::repository::TradeRepository;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep before attempt `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(20))
    }
}

pub struct TradeCoordinator {
    repo: Arc<dyn TradeRepository>,
    policy: RetryPolicy,
}

impl TradeCoordinator {
    pub fn new(repo: Arc<dyn TradeRepository>, policy: RetryPolicy) -> Self {
        Self { repo, policy }
    }

    /// `SubmitTrade`: validate, then record atomically.
    pub async fn submit_trade(&self, cmd: &TradeCommand) -> Result<RecordedTrade, TradeError> {
        let trade = cmd.validate().inspect_err(|e| {
            warn!(error = %e, ticker = %cmd.ticker_symbol, "trade rejected by validation");
        })?;

        self.submit_valid(&trade).await
    }

    /// Records an already-validated trade.
    pub async fn submit_valid(&self, trade: &ValidTrade) -> Result<RecordedTrade, TradeError> {
        let trace_id = TraceId::default();
        let span = root_span("submit_trade", &trace_id);

        async {
            annotate_span(trade.symbol.as_str(), trade.broker_id.get());
            self.record_with_retry(trade).await
        }
        .instrument(span)
        .await
    }

    async fn record_with_retry(&self, trade: &ValidTrade) -> Result<RecordedTrade, TradeError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = self
                .repo
                .record_trade(trade)
                .instrument(child_span("record_attempt"))
                .await;

            match outcome {
                Ok(recorded) => {
                    info!(
                        trade_id = %recorded.trade_id,
                        attempt,
                        index = ?recorded.index,
                        "trade recorded"
                    );
                    return Ok(recorded);
                }
                Err(StoreError::Conflict(reason)) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "write conflict; retrying submission"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    error!(attempt, error = %source, "trade submission failed");
                    return Err(TradeError::Storage {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    #[instrument(skip(self), fields(ticker = %symbol))]
    pub async fn recent_trades(
        &self,
        symbol: &TickerSymbol,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.repo.recent_trades(symbol, limit).await
    }
}
