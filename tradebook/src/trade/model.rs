use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::store::index::IndexOutcome;

/// Every ticker symbol is exactly this many characters.
pub const SYMBOL_LEN: usize = 4;

/// Store-generated trade identifier.
pub type TradeId = Uuid;

/// A well-formed ticker symbol. Case is preserved and significant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::MissingSymbol);
        }

        let actual = raw.chars().count();
        if actual != SYMBOL_LEN {
            return Err(ValidationError::SymbolLength {
                expected: SYMBOL_LEN,
                actual,
            });
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied broker identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrokerId(i64);

impl BrokerId {
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id < 0 {
            return Err(ValidationError::NegativeBrokerId(id));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate key assigned to a ticker by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickerId(pub i64);

impl fmt::Display for TickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordering key of a ledger entry.
///
/// Compared lexicographically: wall-clock time first, then the ledger
/// sequence, so two entries never compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TradeStamp {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

/// Raw trade as received from the service layer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCommand {
    pub broker_id: i64,
    pub ticker_symbol: String,
    pub number_of_shares: Decimal,
    pub price: Decimal,
}

impl TradeCommand {
    /// Checks run in a fixed order so the first failing field is reported.
    pub fn validate(&self) -> Result<ValidTrade, ValidationError> {
        if self.ticker_symbol.trim().is_empty() {
            return Err(ValidationError::MissingSymbol);
        }
        if self.number_of_shares <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.number_of_shares));
        }
        if self.price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice(self.price));
        }

        let broker_id = BrokerId::new(self.broker_id)?;
        let symbol = TickerSymbol::parse(&self.ticker_symbol)?;

        Ok(ValidTrade {
            broker_id,
            symbol,
            quantity: self.number_of_shares,
            price: self.price,
        })
    }
}

/// A trade whose fields satisfy every precondition of the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidTrade {
    pub broker_id: BrokerId,
    pub symbol: TickerSymbol,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Result of a committed submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedTrade {
    pub trade_id: TradeId,
    pub ticker_id: TickerId,
    pub broker_id: BrokerId,
    pub stamp: TradeStamp,
    pub index: IndexOutcome,
}

/// A ledger row as read back from storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub trade_id: TradeId,
    pub seq: i64,
    pub broker_id: i64,
    pub ticker_symbol: String,
    pub price: Decimal,
    pub number_of_shares: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cmd(broker_id: i64, symbol: &str, shares: i64, price: i64) -> TradeCommand {
        TradeCommand {
            broker_id,
            ticker_symbol: symbol.to_string(),
            number_of_shares: Decimal::from(shares),
            price: Decimal::from(price),
        }
    }

    #[test]
    fn valid_command_passes() {
        let trade = cmd(1, "ABCD", 10, 5).validate().unwrap();

        assert_eq!(trade.symbol.as_str(), "ABCD");
        assert_eq!(trade.broker_id.get(), 1);
        assert_eq!(trade.quantity, Decimal::from(10));
    }

    #[test]
    fn zero_price_and_broker_zero_are_allowed() {
        assert!(cmd(0, "ABCD", 1, 0).validate().is_ok());
    }

    #[test]
    fn rejects_each_bad_field() {
        assert_eq!(
            cmd(1, "   ", 10, 5).validate(),
            Err(ValidationError::MissingSymbol)
        );
        assert_eq!(
            cmd(1, "ABCD", 0, 5).validate(),
            Err(ValidationError::NonPositiveQuantity(Decimal::ZERO))
        );
        assert_eq!(
            cmd(1, "ABCD", 1, -1).validate(),
            Err(ValidationError::NegativePrice(Decimal::from(-1)))
        );
        assert_eq!(
            cmd(-3, "ABCD", 1, 1).validate(),
            Err(ValidationError::NegativeBrokerId(-3))
        );
        assert_eq!(
            cmd(1, "ABCDE", 1, 1).validate(),
            Err(ValidationError::SymbolLength {
                expected: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn quantity_is_checked_before_symbol_length() {
        assert_eq!(
            cmd(1, "AB", 0, 1).validate(),
            Err(ValidationError::NonPositiveQuantity(Decimal::ZERO))
        );
    }

    #[test]
    fn symbols_are_case_sensitive() {
        let upper = TickerSymbol::parse("ABCD").unwrap();
        let lower = TickerSymbol::parse("abcd").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn stamp_orders_by_time_then_seq() {
        let t = Utc::now();
        let a = TradeStamp { created_at: t, seq: 1 };
        let b = TradeStamp { created_at: t, seq: 2 };
        let c = TradeStamp {
            created_at: t + chrono::Duration::microseconds(1),
            seq: 0,
        };

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn command_deserializes_from_camel_case() {
        let cmd: TradeCommand = serde_json::from_str(
            r#"{"brokerId":7,"tickerSymbol":"VOD1","numberOfShares":"2.5","price":"101.25"}"#,
        )
        .unwrap();

        assert_eq!(cmd.broker_id, 7);
        assert_eq!(cmd.price, Decimal::new(10125, 2));
    }

    proptest! {
        #[test]
        fn parse_accepts_exactly_four_chars(s in "\\PC{0,8}") {
            let n = s.chars().count();
            let parsed = TickerSymbol::parse(&s);
            if s.trim().is_empty() {
                prop_assert_eq!(parsed, Err(ValidationError::MissingSymbol));
            } else if n == SYMBOL_LEN {
                let sym = parsed.unwrap();
                prop_assert_eq!(sym.as_str(), s.as_str());
            } else {
                prop_assert_eq!(parsed, Err(ValidationError::SymbolLength { expected: SYMBOL_LEN, actual: n }));
            }
        }
    }
}
