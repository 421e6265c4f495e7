//! Read projections over the latest-value index.
//!
//! Reads join `latest_values -> trades -> tickers` and never write; a lookup
//! for an unknown symbol creates nothing.

pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service;
