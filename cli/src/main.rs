pub mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use tradebook::config::AppConfig;
use tradebook::db::Db;
use tradebook::quotes::repository_sqlx::SqlxStockValueRepository;
use tradebook::trade::repository_sqlx::SqlxTradeRepository;
use tradebook::{StockValueService, TickerSymbol, TradeCoordinator};

use cli::{Cli, Command, to_trade_command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init_logger("tradebook-cli");

    let cli = Cli::parse();

    let mut cfg = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    let db = Db::connect(&cfg).await?;
    db.migrate().await.context("schema migration failed")?;

    let coordinator = TradeCoordinator::new(
        Arc::new(SqlxTradeRepository::new(db.pool.clone())),
        cfg.retry_policy(),
    );
    let quotes = StockValueService::new(Arc::new(SqlxStockValueRepository::new(db.pool.clone())));

    match cli.command {
        Command::Submit {
            broker_id,
            ticker,
            shares,
            price,
        } => {
            let recorded = coordinator
                .submit_trade(&to_trade_command(broker_id, &ticker, shares, price))
                .await?;

            tracing::info!(trade_id = %recorded.trade_id, "submitted");
            println!("{}", recorded.trade_id);
        }

        Command::Price { symbol } => match quotes.get_latest_price(&symbol).await? {
            Some(price) => println!("{price}"),
            None => anyhow::bail!("no trades recorded for {symbol}"),
        },

        Command::Prices { symbols } => {
            let prices = quotes.get_latest_prices(&symbols).await?;
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }

        Command::All => {
            let prices = quotes.get_all_latest_prices().await?;
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }

        Command::Trades { symbol, limit } => {
            let symbol = TickerSymbol::parse(&symbol)?;
            let entries = coordinator.recent_trades(&symbol, limit).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
