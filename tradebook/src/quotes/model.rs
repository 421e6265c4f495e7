use rust_decimal::Decimal;
use serde::Serialize;

/// Current price of a ticker, as referenced by its latest-value pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockValue {
    pub ticker_symbol: String,
    pub price: Decimal,
}
