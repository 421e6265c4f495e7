use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::instrument;

use crate::error::StoreError;
use crate::quotes::model::StockValue;
use crate::quotes::repository::StockValueRepository;
use crate::store::parse_decimal;
use crate::trade::model::TickerSymbol;

const LATEST_VALUES_SELECT: &str = r#"
SELECT tk.ticker_symbol, tr.price
FROM latest_values lv
JOIN trades tr ON tr.trade_id = lv.trade_id
JOIN tickers tk ON tk.ticker_id = lv.ticker_id
"#;

/// SQLx-backed implementation of StockValueRepository.
/// Responsible only for the read joins and row mapping.
pub struct SqlxStockValueRepository {
    pool: SqlitePool,
}

impl SqlxStockValueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockValueRepository for SqlxStockValueRepository {
    #[instrument(skip(self), target = "store", fields(ticker = %symbol))]
    async fn latest_by_symbol(&self, symbol: &TickerSymbol) -> Result<Option<StockValue>, StoreError> {
        let sql = format!("{LATEST_VALUES_SELECT} WHERE tk.ticker_symbol = ?;");

        let row = sqlx::query(&sql)
            .bind(symbol.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_value).transpose()
    }

    #[instrument(skip(self, symbols), target = "store", fields(requested = symbols.len()))]
    async fn latest_by_symbols(&self, symbols: &[TickerSymbol]) -> Result<Vec<StockValue>, StoreError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(LATEST_VALUES_SELECT);
        qb.push(" WHERE tk.ticker_symbol IN (");
        let mut list = qb.separated(", ");
        for s in symbols {
            list.push_bind(s.as_str());
        }
        list.push_unseparated(") ORDER BY tk.ticker_symbol;");

        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter().map(row_to_value).collect()
    }

    #[instrument(skip(self), target = "store")]
    async fn latest_all(&self) -> Result<Vec<StockValue>, StoreError> {
        let sql = format!("{LATEST_VALUES_SELECT} ORDER BY tk.ticker_symbol;");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_value).collect()
    }
}

fn row_to_value(r: &SqliteRow) -> Result<StockValue, StoreError> {
    let price: String = r.try_get("price")?;

    Ok(StockValue {
        ticker_symbol: r.try_get("ticker_symbol")?,
        price: parse_decimal("price", &price)?,
    })
}
