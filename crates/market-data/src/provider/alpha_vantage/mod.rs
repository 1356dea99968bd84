//! Alpha Vantage FX provider.
//!
//! One `CURRENCY_EXCHANGE_RATE` request per pair, issued concurrently.
//! The free tier is heavily rate limited; limit responses arrive as a
//! 200 with a `Note`/`Information` body, which this provider treats as
//! "no data" so the chain can move on.

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Quote, Symbol, SymbolKind};
use crate::provider::QuoteProvider;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    rate: Option<ExchangeRatePayload>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Alpha Vantage returns every numeric field as a string.
#[derive(Debug, Deserialize)]
struct ExchangeRatePayload {
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: Option<String>,
    #[serde(rename = "8. Bid Price")]
    bid_price: Option<String>,
    #[serde(rename = "9. Ask Price")]
    ask_price: Option<String>,
}

impl ExchangeRatePayload {
    fn parse(field: &Option<String>) -> Option<f64> {
        field.as_deref()?.parse().ok()
    }
}

pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    async fn fetch_pair(&self, symbol: &Symbol) -> Option<Quote> {
        let (from, to) = symbol.split_pair()?;
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from),
                ("to_currency", to),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .ok()?;
        let body: ExchangeRateResponse = response.json().await.ok()?;

        if let Some(msg) = body
            .error_message
            .or(body.note)
            .or(body.information)
        {
            debug!("alpha vantage declined {symbol}: {msg}");
            return None;
        }

        let payload = body.rate?;
        Quote::from_book(
            symbol.clone(),
            ExchangeRatePayload::parse(&payload.bid_price),
            ExchangeRatePayload::parse(&payload.ask_price),
            ExchangeRatePayload::parse(&payload.exchange_rate),
            PROVIDER_ID,
        )
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn coverage(&self) -> &'static [SymbolKind] {
        &[SymbolKind::Fx]
    }

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let results = join_all(symbols.iter().map(|s| self.fetch_pair(s))).await;
        let quotes: Vec<Quote> = results.into_iter().flatten().collect();
        if quotes.is_empty() {
            warn!(
                "alpha vantage resolved none of {} requested symbols",
                symbols.len()
            );
        }
        Ok(quotes)
    }
}
