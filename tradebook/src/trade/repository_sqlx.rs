use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::logger::warn_if_slow;
use crate::store::{index, ledger, registrar};
use crate::time::{Clock, SystemClock};
use crate::trade::model::{LedgerEntry, RecordedTrade, TickerSymbol, ValidTrade};
use crate::trade::repository::TradeRepository;

/// Takes SQLite's write lock when the transaction opens rather than at the
/// first write, so the registrar's existence checks and the index's
/// read-compare-write run under it.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// SQLx-backed implementation of TradeRepository.
/// Owns the transaction boundary; the store modules do the individual steps.
pub struct SqlxTradeRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlxTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn record_in_transaction(&self, trade: &ValidTrade) -> Result<RecordedTrade, StoreError> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let ticker_id = registrar::ensure_ticker(&mut *tx, &trade.symbol).await?;
        let broker_id = registrar::ensure_broker(&mut *tx, trade.broker_id).await?;

        let appended = ledger::append(
            &mut *tx,
            self.clock.as_ref(),
            broker_id,
            ticker_id,
            trade.price,
            trade.quantity,
        )
        .await?;

        let outcome =
            index::update_if_newer(&mut *tx, ticker_id, appended.trade_id, &appended.stamp).await?;

        tx.commit().await?;

        debug!(trade_id = %appended.trade_id, ?outcome, "trade committed");

        Ok(RecordedTrade {
            trade_id: appended.trade_id,
            ticker_id,
            broker_id,
            stamp: appended.stamp,
            index: outcome,
        })
    }
}

#[async_trait]
impl TradeRepository for SqlxTradeRepository {
    #[instrument(
        skip(self, trade),
        target = "store",
        fields(ticker = %trade.symbol, broker_id = trade.broker_id.get())
    )]
    async fn record_trade(&self, trade: &ValidTrade) -> Result<RecordedTrade, StoreError> {
        warn_if_slow("db_record_trade", Duration::from_millis(100), async {
            self.record_in_transaction(trade).await
        })
        .await
    }

    #[instrument(skip(self), target = "store", fields(ticker = %symbol))]
    async fn recent_trades(
        &self,
        symbol: &TickerSymbol,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        ledger::entries_for_symbol(&mut conn, symbol, limit).await
    }
}
