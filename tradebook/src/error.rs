use rust_decimal::Decimal;
use thiserror::Error;

/// SQLite primary result codes that signal lock contention. Extended codes
/// (e.g. `SQLITE_BUSY_SNAPSHOT`) carry the primary code in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Caller-supplied trade data that violates a precondition. Never retried and
/// never reaches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker symbol is missing")]
    MissingSymbol,

    #[error("ticker symbol must be {expected} characters, got {actual}")]
    SymbolLength { expected: usize, actual: usize },

    #[error("number of shares must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("price must be greater than or equal to zero, got {0}")]
    NegativePrice(Decimal),

    #[error("broker id must be greater than or equal to zero, got {0}")]
    NegativeBrokerId(i64),
}

/// Failure of a single storage attempt.
///
/// Store components propagate these untouched; only the coordinator decides
/// whether a `Conflict` is worth another attempt.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("storage fault: {0}")]
    Storage(#[source] sqlx::Error),

    #[error("store invariant violated: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_contention(&err) {
            StoreError::Conflict(err.to_string())
        } else {
            StoreError::Storage(err)
        }
    }
}

fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .is_some_and(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

/// Outcome of `SubmitTrade` as seen by the caller.
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("invalid trade: {0}")]
    Validation(#[from] ValidationError),

    #[error("trade not recorded after {attempts} attempt(s): {source}")]
    Storage {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}
