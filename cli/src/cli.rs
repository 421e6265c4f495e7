use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use tradebook::TradeCommand;

#[derive(Debug, Parser)]
#[clap(name = "tradebook", version)]
pub struct Cli {
    /// Overrides DATABASE_URL
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a trade and update the ticker's latest price
    Submit {
        #[clap(long)]
        broker_id: i64,

        #[clap(long)]
        ticker: String,

        /// Number of shares traded
        #[clap(long)]
        shares: Decimal,

        #[clap(long)]
        price: Decimal,
    },

    /// Latest price of one ticker
    Price { symbol: String },

    /// Latest prices of several tickers
    Prices {
        #[clap(required = true)]
        symbols: Vec<String>,
    },

    /// Latest price of every traded ticker
    All,

    /// Most recent ledger entries for a ticker
    Trades {
        symbol: String,

        #[clap(long, default_value_t = 20)]
        limit: u32,
    },
}

/// Builds the service-layer command from `submit` arguments.
pub(crate) fn to_trade_command(
    broker_id: i64,
    ticker: &str,
    shares: Decimal,
    price: Decimal,
) -> TradeCommand {
    TradeCommand {
        broker_id,
        ticker_symbol: ticker.to_string(),
        number_of_shares: shares,
        price,
    }
}
