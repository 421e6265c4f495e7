use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Tickers
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS tickers (
  ticker_id INTEGER PRIMARY KEY AUTOINCREMENT,
  ticker_symbol TEXT NOT NULL UNIQUE
);
"#,
    )
    .execute(pool)
    .await?;

    // Brokers
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS brokers (
  broker_id INTEGER PRIMARY KEY CHECK (broker_id >= 0)
);
"#,
    )
    .execute(pool)
    .await?;

    // Trades (append-only ledger). `seq` breaks created_at ties.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS trades (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  trade_id TEXT NOT NULL UNIQUE,
  broker_id INTEGER NOT NULL REFERENCES brokers(broker_id),
  ticker_id INTEGER NOT NULL REFERENCES tickers(ticker_id),
  price TEXT NOT NULL,
  number_of_shares TEXT NOT NULL,
  created_at_us BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Latest-value projection: one row per ticker.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS latest_values (
  ticker_id INTEGER PRIMARY KEY REFERENCES tickers(ticker_id),
  trade_id TEXT NOT NULL REFERENCES trades(trade_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_trades_ticker ON trades(ticker_id, created_at_us, seq);"#,
    )
    .execute(pool)
    .await?;

    // Store-wide newest stamp lookup on append.
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_trades_created ON trades(created_at_us);"#)
        .execute(pool)
        .await?;

    Ok(())
}
