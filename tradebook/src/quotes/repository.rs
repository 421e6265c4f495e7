use async_trait::async_trait;

use crate::error::StoreError;
use crate::quotes::model::StockValue;
use crate::trade::model::TickerSymbol;

#[async_trait]
pub trait StockValueRepository: Send + Sync {
    async fn latest_by_symbol(&self, symbol: &TickerSymbol) -> Result<Option<StockValue>, StoreError>;

    /// Values for the given symbols that have at least one trade.
    async fn latest_by_symbols(&self, symbols: &[TickerSymbol]) -> Result<Vec<StockValue>, StoreError>;

    async fn latest_all(&self) -> Result<Vec<StockValue>, StoreError>;
}
