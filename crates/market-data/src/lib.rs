//! Quotehub Market Data Crate
//!
//! Provider-agnostic live quote aggregation for the quotehub service.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Canonical, separator-free symbols (e.g. `EURUSD`, `BTCUSD`, `XAUUSD`)
//! - Multiple upstream providers: Yahoo Finance, Alpha Vantage, Binance,
//!   and a generic exchange-rate API
//! - Ordered fallback with partial-coverage merging
//! - An in-memory snapshot hub that fans every update out to subscribers
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  QuoteProvider   | --> |      Quote       |  (normalized record)
//! +------------------+     +------------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! |  FallbackChain   | --> |     QuoteHub     |  (cache + fan-out)
//! +------------------+     +------------------+
//! ```
//!
//! Providers never leak upstream response shapes past their boundary; the
//! chain treats an empty or failed provider result as "try the next one".

pub mod chain;
pub mod errors;
pub mod hub;
pub mod models;
pub mod provider;

pub use chain::FallbackChain;
pub use errors::MarketDataError;
pub use hub::{QuoteHub, SnapshotFrame};
pub use models::{Quote, Symbol, SymbolKind};
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::binance::BinanceProvider;
pub use provider::exchange_rate::ExchangeRateApiProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::QuoteProvider;
