//! Ledger Store: the append-only trade log.
//!
//! Rows are inserted once and never updated or deleted. The store stamps
//! each row with the clock reading (microsecond resolution) and a strictly
//! increasing `seq`, which is what makes `TradeStamp` a total order.
//!
//! `created_at` never goes backwards: a reading older than the newest stored
//! stamp is raised to it, and `seq` then orders the two. Callers append inside
//! a write transaction, so stamp order is commit order even if the host clock
//! steps back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{parse_decimal, parse_trade_id};
use crate::error::StoreError;
use crate::time::Clock;
use crate::trade::model::{BrokerId, LedgerEntry, TickerId, TickerSymbol, TradeId, TradeStamp};

/// Identity the ledger assigned to a freshly appended trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendedTrade {
    pub trade_id: TradeId,
    pub stamp: TradeStamp,
}

pub async fn append(
    conn: &mut SqliteConnection,
    clock: &dyn Clock,
    broker_id: BrokerId,
    ticker_id: TickerId,
    price: Decimal,
    quantity: Decimal,
) -> Result<AppendedTrade, StoreError> {
    let trade_id = Uuid::new_v4();
    let reading = truncate_to_micros(clock.now())?;
    let created_at = match newest_stamp_micros(&mut *conn).await? {
        Some(newest) if newest > reading.timestamp_micros() => {
            warn!(
                reading_us = reading.timestamp_micros(),
                newest_us = newest,
                "clock behind ledger; holding stamp at newest entry"
            );
            micros_to_utc(newest)?
        }
        _ => reading,
    };

    let seq: i64 = sqlx::query_scalar(
        r#"
INSERT INTO trades (trade_id, broker_id, ticker_id, price, number_of_shares, created_at_us)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING seq;
"#,
    )
    .bind(trade_id.to_string())
    .bind(broker_id.get())
    .bind(ticker_id.0)
    .bind(price.to_string())
    .bind(quantity.to_string())
    .bind(created_at.timestamp_micros())
    .fetch_one(&mut *conn)
    .await?;

    debug!(%trade_id, seq, ticker_id = ticker_id.0, "ledger append");

    Ok(AppendedTrade {
        trade_id,
        stamp: TradeStamp { created_at, seq },
    })
}

async fn newest_stamp_micros(conn: &mut SqliteConnection) -> Result<Option<i64>, StoreError> {
    let newest: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at_us) FROM trades;")
        .fetch_one(&mut *conn)
        .await?;
    Ok(newest)
}

/// Ordering key of an existing trade, `None` if the id is unknown.
pub async fn fetch_stamp(
    conn: &mut SqliteConnection,
    trade_id: &TradeId,
) -> Result<Option<TradeStamp>, StoreError> {
    let row = sqlx::query("SELECT created_at_us, seq FROM trades WHERE trade_id = ?;")
        .bind(trade_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(r) => Ok(Some(TradeStamp {
            created_at: micros_to_utc(r.try_get("created_at_us")?)?,
            seq: r.try_get("seq")?,
        })),
        None => Ok(None),
    }
}

/// Most recent trades for a symbol, newest first.
pub async fn entries_for_symbol(
    conn: &mut SqliteConnection,
    symbol: &TickerSymbol,
    limit: u32,
) -> Result<Vec<LedgerEntry>, StoreError> {
    let rows = sqlx::query(
        r#"
SELECT
  tr.trade_id, tr.seq, tr.broker_id, tk.ticker_symbol,
  tr.price, tr.number_of_shares, tr.created_at_us
FROM trades tr
JOIN tickers tk ON tk.ticker_id = tr.ticker_id
WHERE tk.ticker_symbol = ?
ORDER BY tr.created_at_us DESC, tr.seq DESC
LIMIT ?;
"#,
    )
    .bind(symbol.as_str())
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_entry).collect()
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_entry(r: &SqliteRow) -> Result<LedgerEntry, StoreError> {
    let trade_id: String = r.try_get("trade_id")?;
    let price: String = r.try_get("price")?;
    let shares: String = r.try_get("number_of_shares")?;

    Ok(LedgerEntry {
        trade_id: parse_trade_id(&trade_id)?,
        seq: r.try_get("seq")?,
        broker_id: r.try_get("broker_id")?,
        ticker_symbol: r.try_get("ticker_symbol")?,
        price: parse_decimal("price", &price)?,
        number_of_shares: parse_decimal("number_of_shares", &shares)?,
        created_at: micros_to_utc(r.try_get("created_at_us")?)?,
    })
}

fn truncate_to_micros(t: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
    micros_to_utc(t.timestamp_micros())
}

fn micros_to_utc(us: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {us}us")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::store::registrar;
    use crate::time::SystemClock;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    async fn setup() -> (Db, TickerId, BrokerId) {
        let db = Db::in_memory().await.unwrap();
        db.migrate().await.unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let ticker = registrar::ensure_ticker(&mut conn, &TickerSymbol::parse("ABCD").unwrap())
            .await
            .unwrap();
        let broker = registrar::ensure_broker(&mut conn, BrokerId::new(1).unwrap())
            .await
            .unwrap();
        drop(conn);

        (db, ticker, broker)
    }

    #[tokio::test]
    async fn identical_clock_readings_are_ordered_by_seq() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let clock = FixedClock(Utc::now());

        let a = append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        let b = append(&mut conn, &clock, broker, ticker, Decimal::TWO, Decimal::ONE)
            .await
            .unwrap();

        assert_eq!(a.stamp.created_at, b.stamp.created_at);
        assert!(b.stamp > a.stamp);
        assert_ne!(a.trade_id, b.trade_id);
    }

    #[tokio::test]
    async fn clock_stepping_back_still_stamps_later_append_newer() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let t = Utc::now();

        let a = append(&mut conn, &FixedClock(t), broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        let behind = FixedClock(t - chrono::Duration::seconds(2));
        let b = append(&mut conn, &behind, broker, ticker, Decimal::TWO, Decimal::ONE)
            .await
            .unwrap();

        assert!(b.stamp > a.stamp);
        assert_eq!(b.stamp.created_at, a.stamp.created_at);

        let stored = fetch_stamp(&mut conn, &b.trade_id).await.unwrap().unwrap();
        assert_eq!(stored, b.stamp);
    }

    #[tokio::test]
    async fn clock_ahead_of_ledger_is_used_as_is() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let t = truncate_to_micros(Utc::now()).unwrap();

        let a = append(&mut conn, &FixedClock(t), broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        let later = t + chrono::Duration::milliseconds(3);
        let b = append(&mut conn, &FixedClock(later), broker, ticker, Decimal::TWO, Decimal::ONE)
            .await
            .unwrap();

        assert_eq!(a.stamp.created_at, t);
        assert_eq!(b.stamp.created_at, later);
    }

    #[tokio::test]
    async fn stored_stamp_matches_returned_stamp() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let appended = append(
            &mut conn,
            &SystemClock,
            broker,
            ticker,
            Decimal::new(500, 2),
            Decimal::TEN,
        )
        .await
        .unwrap();

        let stamp = fetch_stamp(&mut conn, &appended.trade_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stamp, appended.stamp);
    }

    #[tokio::test]
    async fn fetch_stamp_of_unknown_trade_is_none() {
        let (db, _, _) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();

        assert!(fetch_stamp(&mut conn, &Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_keep_full_decimal_precision() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let price = Decimal::from_str_exact("123.456789012345678").unwrap();
        let shares = Decimal::from_str_exact("0.0001").unwrap();

        append(&mut conn, &SystemClock, broker, ticker, price, shares)
            .await
            .unwrap();

        let entries = entries_for_symbol(&mut conn, &TickerSymbol::parse("ABCD").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].price, price);
        assert_eq!(entries[0].number_of_shares, shares);
        assert_eq!(entries[0].broker_id, 1);
    }

    #[tokio::test]
    async fn entries_are_newest_first_and_limited() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let mut ids = Vec::new();
        for p in 1..=3 {
            let t = append(&mut conn, &SystemClock, broker, ticker, Decimal::from(p), Decimal::ONE)
                .await
                .unwrap();
            ids.push(t.trade_id);
        }

        let entries = entries_for_symbol(&mut conn, &TickerSymbol::parse("ABCD").unwrap(), 2)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].trade_id, ids[2]);
        assert_eq!(entries[1].trade_id, ids[1]);
    }
}
