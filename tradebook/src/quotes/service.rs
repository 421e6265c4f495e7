use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::logger::warn_if_slow;
use crate::quotes::model::StockValue;
use crate::quotes::repository::StockValueRepository;
use crate::trade::model::TickerSymbol;

/// Price lookups for the read-service layer.
///
/// Malformed symbols can never have trades, so they resolve to "absent"
/// without touching storage instead of failing the whole request.
pub struct StockValueService {
    repo: Arc<dyn StockValueRepository>,
}

impl StockValueService {
    pub fn new(repo: Arc<dyn StockValueRepository>) -> Self {
        Self { repo }
    }

    /// `GetLatestPrice`.
    #[instrument(skip(self))]
    pub async fn get_latest_price(&self, symbol: &str) -> Result<Option<Decimal>, StoreError> {
        let Ok(symbol) = TickerSymbol::parse(symbol) else {
            debug!("malformed symbol; no price");
            return Ok(None);
        };

        let value = warn_if_slow("db_latest_by_symbol", Duration::from_millis(50), async {
            self.repo.latest_by_symbol(&symbol).await
        })
        .await?;

        Ok(value.map(|v| v.price))
    }

    /// `GetLatestPrices`. Duplicate and malformed symbols are dropped.
    #[instrument(skip(self, symbols), fields(requested = symbols.len()))]
    pub async fn get_latest_prices<S: AsRef<str>>(
        &self,
        symbols: &[S],
    ) -> Result<BTreeMap<String, Decimal>, StoreError> {
        let wanted: BTreeSet<TickerSymbol> = symbols
            .iter()
            .filter_map(|s| TickerSymbol::parse(s.as_ref()).ok())
            .collect();

        if wanted.is_empty() {
            debug!("no well-formed symbols requested");
            return Ok(BTreeMap::new());
        }

        let wanted: Vec<TickerSymbol> = wanted.into_iter().collect();
        let values = warn_if_slow("db_latest_by_symbols", Duration::from_millis(100), async {
            self.repo.latest_by_symbols(&wanted).await
        })
        .await?;

        Ok(into_price_map(values))
    }

    /// `GetAllLatestPrices`.
    #[instrument(skip(self))]
    pub async fn get_all_latest_prices(&self) -> Result<BTreeMap<String, Decimal>, StoreError> {
        let values = warn_if_slow("db_latest_all", Duration::from_millis(200), async {
            self.repo.latest_all().await
        })
        .await?;

        Ok(into_price_map(values))
    }
}

fn into_price_map(values: Vec<StockValue>) -> BTreeMap<String, Decimal> {
    values
        .into_iter()
        .map(|v| (v.ticker_symbol, v.price))
        .collect()
}
