use async_trait::async_trait;

use crate::error::StoreError;
use crate::trade::model::{LedgerEntry, RecordedTrade, TickerSymbol, ValidTrade};

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// One atomic attempt at recording `trade`: registrar, ledger append and
    /// latest-value update either all commit or none do. Never retries.
    async fn record_trade(&self, trade: &ValidTrade) -> Result<RecordedTrade, StoreError>;

    async fn recent_trades(
        &self,
        symbol: &TickerSymbol,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, StoreError>;
}
