//! Latest-Value Index: one pointer per ticker to its current ledger entry.
//!
//! `update_if_newer` is a compare-and-swap executed inside the caller's write
//! transaction. The transaction holds the database write lock from its first
//! statement, so the read of the current pointer, the stamp comparison and the
//! write cannot interleave with another submission. The `UPDATE` still guards
//! on the previously read trade id; a miss is reported as a conflict rather
//! than silently overwriting a newer pointer.

use sqlx::SqliteConnection;
use tracing::debug;

use super::{ledger, parse_trade_id};
use crate::error::StoreError;
use crate::trade::model::{TickerId, TradeId, TradeStamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOutcome {
    /// First trade for the ticker; a pointer was created.
    Inserted,
    /// The candidate was strictly newer and replaced `previous`.
    Replaced { previous: TradeId },
    /// `current` is at least as new as the candidate; nothing was written.
    Unchanged { current: TradeId },
}

impl IndexOutcome {
    pub fn is_current(&self) -> bool {
        !matches!(self, IndexOutcome::Unchanged { .. })
    }
}

pub async fn update_if_newer(
    conn: &mut SqliteConnection,
    ticker_id: TickerId,
    trade_id: TradeId,
    stamp: &TradeStamp,
) -> Result<IndexOutcome, StoreError> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT trade_id FROM latest_values WHERE ticker_id = ?;")
            .bind(ticker_id.0)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(current) = current else {
        let inserted = sqlx::query(
            r#"
INSERT INTO latest_values (ticker_id, trade_id) VALUES (?, ?)
ON CONFLICT(ticker_id) DO NOTHING;
"#,
        )
        .bind(ticker_id.0)
        .bind(trade_id.to_string())
        .execute(&mut *conn)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "latest value for ticker {ticker_id} appeared concurrently"
            )));
        }

        debug!(ticker_id = ticker_id.0, %trade_id, "latest value created");
        return Ok(IndexOutcome::Inserted);
    };

    let current_id = parse_trade_id(&current)?;
    let current_stamp = ledger::fetch_stamp(&mut *conn, &current_id)
        .await?
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "latest value for ticker {ticker_id} references missing trade {current_id}"
            ))
        })?;

    if *stamp <= current_stamp {
        debug!(
            ticker_id = ticker_id.0,
            %trade_id,
            current = %current_id,
            "candidate not newer; latest value kept"
        );
        return Ok(IndexOutcome::Unchanged {
            current: current_id,
        });
    }

    let updated = sqlx::query(
        r#"
UPDATE latest_values
SET trade_id = ?
WHERE ticker_id = ? AND trade_id = ?;
"#,
    )
    .bind(trade_id.to_string())
    .bind(ticker_id.0)
    .bind(&current)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "latest value for ticker {ticker_id} moved during compare-and-swap"
        )));
    }

    debug!(ticker_id = ticker_id.0, %trade_id, previous = %current_id, "latest value replaced");
    Ok(IndexOutcome::Replaced {
        previous: current_id,
    })
}

/// Trade id the index currently points at.
#[cfg(test)]
async fn current(
    conn: &mut SqliteConnection,
    ticker_id: TickerId,
) -> Result<Option<TradeId>, StoreError> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT trade_id FROM latest_values WHERE ticker_id = ?;")
            .bind(ticker_id.0)
            .fetch_optional(&mut *conn)
            .await?;

    current.as_deref().map(parse_trade_id).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::Db;
    use crate::store::registrar;
    use crate::time::Clock;
    use crate::trade::model::{BrokerId, TickerSymbol};

    /// Hands out pre-set readings in order.
    struct ScriptedClock(Mutex<Vec<DateTime<Utc>>>);

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.lock().remove(0)
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
    async fn first_trade_creates_pointer() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let clock = ScriptedClock(Mutex::new(vec![Utc::now()]));

        let t = ledger::append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        let outcome = update_if_newer(&mut conn, ticker, t.trade_id, &t.stamp)
            .await
            .unwrap();

        assert_eq!(outcome, IndexOutcome::Inserted);
        assert_eq!(current(&mut conn, ticker).await.unwrap(), Some(t.trade_id));
    }

    #[tokio::test]
    async fn newer_trade_replaces_pointer() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let t0 = Utc::now();
        let clock = ScriptedClock(Mutex::new(vec![t0, t0 + Duration::milliseconds(5)]));

        let old = ledger::append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        update_if_newer(&mut conn, ticker, old.trade_id, &old.stamp)
            .await
            .unwrap();

        let new = ledger::append(&mut conn, &clock, broker, ticker, Decimal::TWO, Decimal::ONE)
            .await
            .unwrap();
        let outcome = update_if_newer(&mut conn, ticker, new.trade_id, &new.stamp)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Replaced {
                previous: old.trade_id
            }
        );
        assert_eq!(current(&mut conn, ticker).await.unwrap(), Some(new.trade_id));
    }

    #[tokio::test]
    async fn older_candidate_leaves_pointer_untouched() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let t0 = Utc::now();
        let clock = ScriptedClock(Mutex::new(vec![t0, t0 + Duration::seconds(1)]));

        let older = ledger::append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        let newer = ledger::append(&mut conn, &clock, broker, ticker, Decimal::TWO, Decimal::ONE)
            .await
            .unwrap();

        // The newer trade reaches the index first.
        update_if_newer(&mut conn, ticker, newer.trade_id, &newer.stamp)
            .await
            .unwrap();
        let outcome = update_if_newer(&mut conn, ticker, older.trade_id, &older.stamp)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IndexOutcome::Unchanged {
                current: newer.trade_id
            }
        );
        assert!(!outcome.is_current());
        assert_eq!(current(&mut conn, ticker).await.unwrap(), Some(newer.trade_id));
    }

    #[tokio::test]
    async fn equal_stamp_does_not_replace() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let clock = ScriptedClock(Mutex::new(vec![Utc::now()]));

        let t = ledger::append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();
        update_if_newer(&mut conn, ticker, t.trade_id, &t.stamp)
            .await
            .unwrap();

        let again = update_if_newer(&mut conn, ticker, t.trade_id, &t.stamp)
            .await
            .unwrap();
        assert_eq!(again, IndexOutcome::Unchanged { current: t.trade_id });
    }

    #[tokio::test]
    async fn dangling_pointer_is_reported_as_corruption() {
        let (db, ticker, broker) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let clock = ScriptedClock(Mutex::new(vec![Utc::now()]));

        let t = ledger::append(&mut conn, &clock, broker, ticker, Decimal::ONE, Decimal::ONE)
            .await
            .unwrap();

        // Foreign keys are on; point at a trade id that does not exist by
        // disabling them for this connection only.
        sqlx::query("PRAGMA foreign_keys = OFF;")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO latest_values (ticker_id, trade_id) VALUES (?, ?)")
            .bind(ticker.0)
            .bind(uuid::Uuid::new_v4().to_string())
            .execute(&mut *conn)
            .await
            .unwrap();

        let err = update_if_newer(&mut conn, ticker, t.trade_id, &t.stamp)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
