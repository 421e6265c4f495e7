//! Store-side building blocks of a trade submission.
//!
//! Each function takes the connection of an already-open write transaction
//! and performs one step: registrar lookups, the ledger append, or the
//! latest-value compare-and-swap. None of them begin, commit or retry; the
//! caller owns the unit of work. Errors are propagated as-is.

pub mod index;
pub mod ledger;
pub mod registrar;

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StoreError;

/* =========================
Column conversions
========================= */

pub(crate) fn parse_trade_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("invalid trade_id {raw:?}: {e}")))
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("invalid decimal in {column} {raw:?}: {e}")))
}
