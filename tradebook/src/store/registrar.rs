//! Entity Registrar: idempotent get-or-create for tickers and brokers.
//!
//! Creation is an insert-if-absent against the table's uniqueness constraint.
//! Losing a first-insert race is not an error: the insert yields no row and
//! the winner's row is looked up instead.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::trade::model::{BrokerId, TickerId, TickerSymbol};

pub async fn find_ticker(
    conn: &mut SqliteConnection,
    symbol: &TickerSymbol,
) -> Result<Option<TickerId>, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT ticker_id FROM tickers WHERE ticker_symbol = ?;")
        .bind(symbol.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(id.map(TickerId))
}

pub async fn ensure_ticker(
    conn: &mut SqliteConnection,
    symbol: &TickerSymbol,
) -> Result<TickerId, StoreError> {
    if let Some(id) = find_ticker(&mut *conn, symbol).await? {
        debug!(%symbol, ticker_id = id.0, "ticker already registered");
        return Ok(id);
    }

    insert_ticker(conn, symbol).await
}

/// Insert step of `ensure_ticker`. Under a write transaction the preceding
/// lookup already saw any existing row; the re-read covers callers that do
/// not hold the write lock.
async fn insert_ticker(
    conn: &mut SqliteConnection,
    symbol: &TickerSymbol,
) -> Result<TickerId, StoreError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
INSERT INTO tickers (ticker_symbol) VALUES (?)
ON CONFLICT(ticker_symbol) DO NOTHING
RETURNING ticker_id;
"#,
    )
    .bind(symbol.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        info!(%symbol, ticker_id = id, "registered new ticker");
        return Ok(TickerId(id));
    }

    debug!(%symbol, "ticker created concurrently; re-reading");
    find_ticker(conn, symbol)
        .await?
        .ok_or_else(|| StoreError::Corrupt(format!("ticker {symbol} vanished after insert conflict")))
}

pub async fn ensure_broker(
    conn: &mut SqliteConnection,
    broker_id: BrokerId,
) -> Result<BrokerId, StoreError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
INSERT INTO brokers (broker_id) VALUES (?)
ON CONFLICT(broker_id) DO NOTHING
RETURNING broker_id;
"#,
    )
    .bind(broker_id.get())
    .fetch_optional(&mut *conn)
    .await?;

    if inserted.is_some() {
        info!(%broker_id, "registered new broker");
        return Ok(broker_id);
    }

    let existing: Option<i64> = sqlx::query_scalar("SELECT broker_id FROM brokers WHERE broker_id = ?;")
        .bind(broker_id.get())
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(_) => Ok(broker_id),
        None => Err(StoreError::Corrupt(format!(
            "broker {broker_id} vanished after insert conflict"
        ))),
    }
}
