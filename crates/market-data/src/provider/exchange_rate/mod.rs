//! Open exchange-rate table provider.
//!
//! Last-resort FX source: one request fetches the full USD-based rate
//! table, from which any FX cross can be derived. With the approximation
//! flag enabled it also derives metal prices from the table's X-code
//! rates, clearly tagged so consumers can tell them apart from real
//! market quotes.

use std::collections::HashMap;

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Quote, Symbol, SymbolKind};
use crate::provider::QuoteProvider;

const BASE_URL: &str = "https://open.er-api.com/v6/latest/USD";
const PROVIDER_ID: &str = "EXCHANGE_RATE_API";

/// Source tag for metal prices derived from the rate table rather than
/// an actual metals market.
const APPROX_SOURCE: &str = "METAL_APPROX";

#[derive(Debug, Deserialize)]
struct RateTableResponse {
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

pub struct ExchangeRateApiProvider {
    client: Client,
    metal_approx: bool,
}

impl ExchangeRateApiProvider {
    pub fn new(metal_approx: bool) -> Self {
        Self {
            client: Client::new(),
            metal_approx,
        }
    }

    fn rate_of(rates: &HashMap<String, f64>, currency: &str) -> Option<f64> {
        rates.get(currency).copied().filter(|r| *r > 0.0)
    }

    /// Derives a pair price from the USD-based table: direct for USD
    /// bases, inverted for USD quotes, crossed otherwise.
    fn derive(rates: &HashMap<String, f64>, symbol: &Symbol) -> Option<f64> {
        let (base, quote) = symbol.split_pair()?;
        match (base, quote) {
            ("USD", q) => Self::rate_of(rates, q),
            (b, "USD") => Some(1.0 / Self::rate_of(rates, b)?),
            (b, q) => Some(Self::rate_of(rates, q)? / Self::rate_of(rates, b)?),
        }
    }
}

#[async_trait]
impl QuoteProvider for ExchangeRateApiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        4
    }

    fn coverage(&self) -> &'static [SymbolKind] {
        if self.metal_approx {
            &[SymbolKind::Fx, SymbolKind::Metal]
        } else {
            &[SymbolKind::Fx]
        }
    }

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let response = self.client.get(BASE_URL).send().await?;
        if !response.status().is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        let table: RateTableResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("malformed response: {e}"),
                })?;
        if table.result.as_deref() != Some("success") || table.rates.is_empty() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "rate table unavailable".to_string(),
            });
        }

        Ok(symbols
            .iter()
            .filter_map(|symbol| match symbol.kind() {
                SymbolKind::Fx => {
                    let price = Self::derive(&table.rates, symbol)?;
                    Quote::from_last(symbol.clone(), price, PROVIDER_ID)
                }
                SymbolKind::Metal if self.metal_approx => {
                    let price = Self::derive(&table.rates, symbol)?;
                    warn!("serving approximated metal price for {symbol}");
                    Quote::from_last(symbol.clone(), price, APPROX_SOURCE)
                }
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn rates(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn derives_inverse_for_usd_quotes() {
        let table = rates(&[("EUR", 0.92)]);
        let price = ExchangeRateApiProvider::derive(&table, &sym("EURUSD")).unwrap();
        assert!((price - 1.0 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn derives_direct_for_usd_bases() {
        let table = rates(&[("JPY", 155.2)]);
        assert_eq!(
            ExchangeRateApiProvider::derive(&table, &sym("USDJPY")),
            Some(155.2)
        );
    }

    #[test]
    fn derives_crosses_through_usd() {
        let table = rates(&[("EUR", 0.92), ("GBP", 0.78)]);
        let price = ExchangeRateApiProvider::derive(&table, &sym("EURGBP")).unwrap();
        assert!((price - 0.78 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn missing_or_zero_rates_yield_none() {
        let table = rates(&[("EUR", 0.92), ("XXX", 0.0)]);
        assert_eq!(ExchangeRateApiProvider::derive(&table, &sym("EURCHF")), None);
        assert_eq!(ExchangeRateApiProvider::derive(&table, &sym("XXXUSD")), None);
    }

    #[test]
    fn coverage_follows_the_approximation_flag() {
        assert_eq!(
            ExchangeRateApiProvider::new(false).coverage(),
            &[SymbolKind::Fx]
        );
        assert_eq!(
            ExchangeRateApiProvider::new(true).coverage(),
            &[SymbolKind::Fx, SymbolKind::Metal]
        );
    }

    #[test]
    fn parses_rate_table_payload() {
        let raw = r#"{"result": "success", "rates": {"EUR": 0.92, "JPY": 155.2}}"#;
        let table: RateTableResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(table.result.as_deref(), Some("success"));
        assert_eq!(table.rates.len(), 2);
    }

    #[test]
    fn malformed_payload_is_an_error_not_a_panic() {
        let table: Result<RateTableResponse, _> = serde_json::from_str(r#"{"rates": "nope"}"#);
        assert!(table.is_err());
    }
}
