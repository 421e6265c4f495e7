pub mod config;
pub mod db;
pub mod quotes;
pub mod store;
pub mod trade;

pub mod error;
pub mod logger;
pub mod time;

pub use error::{StoreError, TradeError, ValidationError};
pub use quotes::service::StockValueService;
pub use trade::coordinator::{RetryPolicy, TradeCoordinator};
pub use trade::model::{TickerSymbol, TradeCommand};
