//! Binance spot book-ticker provider.
//!
//! Crypto-only. Canonical `*USD` pairs are quoted against USDT upstream,
//! which is treated as a 1:1 stand-in for USD.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Quote, Symbol, SymbolKind};
use crate::provider::QuoteProvider;

const BASE_URL: &str = "https://api.binance.com/api/v3/ticker/bookTicker";
const PROVIDER_ID: &str = "BINANCE";

const CANONICAL_QUOTE: &str = "USD";
const UPSTREAM_QUOTE: &str = "USDT";

#[derive(Debug, Deserialize)]
struct BookTickerEntry {
    symbol: String,
    #[serde(rename = "bidPrice")]
    bid_price: Option<String>,
    #[serde(rename = "askPrice")]
    ask_price: Option<String>,
}

impl BookTickerEntry {
    fn parse(field: &Option<String>) -> Option<f64> {
        field.as_deref()?.parse().ok()
    }
}

pub struct BinanceProvider {
    client: Client,
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Only USD-quoted pairs translate; anything else has no upstream
    /// equivalent here.
    fn to_upstream(symbol: &Symbol) -> Option<String> {
        let (base, quote) = symbol.split_pair()?;
        if quote != CANONICAL_QUOTE {
            return None;
        }
        Some(format!("{base}{UPSTREAM_QUOTE}"))
    }
}

#[async_trait]
impl QuoteProvider for BinanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn coverage(&self) -> &'static [SymbolKind] {
        &[SymbolKind::Crypto]
    }

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError> {
        let reverse: HashMap<String, Symbol> = symbols
            .iter()
            .filter_map(|s| Self::to_upstream(s).map(|u| (u, s.clone())))
            .collect();
        if reverse.is_empty() {
            return Ok(vec![]);
        }

        // the batch endpoint takes a JSON array of upstream symbols
        let upstream: Vec<&str> = reverse.keys().map(String::as_str).collect();
        let symbols_param = serde_json::to_string(&upstream).unwrap_or_default();

        let response = self
            .client
            .get(BASE_URL)
            .query(&[("symbols", symbols_param.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let entries: Vec<BookTickerEntry> =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("malformed response: {e}"),
                })?;
        debug!("binance returned {} book entries", entries.len());

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let canonical = reverse.get(&entry.symbol)?;
                Quote::from_book(
                    canonical.clone(),
                    BookTickerEntry::parse(&entry.bid_price),
                    BookTickerEntry::parse(&entry.ask_price),
                    None,
                    PROVIDER_ID,
                )
            })
            .collect())
    }
}
