//! Yahoo Finance quote provider.
//!
//! Primary source for the whole symbol universe. Uses the batch v7 quote
//! endpoint and retries a mirror host once when the first host fails.

mod models;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::errors::MarketDataError;
use crate::models::{Quote, Symbol, SymbolKind};
use crate::provider::QuoteProvider;

use models::{QuoteResponseEnvelope, QuoteResult};

const PROVIDER_ID: &str = "YAHOO";

/// query2 mirrors query1; tried in order when a host errors out.
const ENDPOINTS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v7/finance/quote",
    "https://query2.finance.yahoo.com/v7/finance/quote",
];

/// Yahoo rejects default client user agents, so requests identify as a
/// plain desktop browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct YahooProvider {
    client: Client,
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Maps a canonical symbol to Yahoo's spelling: crypto pairs use a
    /// dash (`BTC-USD`), everything else uses the `=X` FX suffix.
    fn to_upstream(symbol: &Symbol) -> String {
        match symbol.kind() {
            SymbolKind::Crypto => match symbol.split_pair() {
                Some((base, quote)) => format!("{base}-{quote}"),
                None => format!("{symbol}=X"),
            },
            SymbolKind::Fx | SymbolKind::Metal => format!("{symbol}=X"),
        }
    }

    async fn fetch_from(
        &self,
        url: &str,
        tickers: &str,
    ) -> Result<Vec<QuoteResult>, MarketDataError> {
        let response = self
            .client
            .get(url)
            .query(&[("symbols", tickers)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let envelope: QuoteResponseEnvelope =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("malformed response: {e}"),
                })?;

        Ok(envelope
            .quote_response
            .map(|body| body.result)
            .unwrap_or_default())
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn coverage(&self) -> &'static [SymbolKind] {
        &[SymbolKind::Fx, SymbolKind::Crypto, SymbolKind::Metal]
    }

    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let reverse: HashMap<String, Symbol> = symbols
            .iter()
            .map(|s| (Self::to_upstream(s), s.clone()))
            .collect();
        let tickers = reverse.keys().cloned().collect::<Vec<_>>().join(",");

        let mut last_err = None;
        for endpoint in ENDPOINTS {
            match self.fetch_from(endpoint, &tickers).await {
                Ok(entries) => {
                    debug!("yahoo returned {} entries from {endpoint}", entries.len());
                    return Ok(entries
                        .into_iter()
                        .filter_map(|entry| {
                            let canonical = reverse.get(entry.symbol.as_deref()?)?;
                            Quote::from_book(
                                canonical.clone(),
                                entry.bid,
                                entry.ask,
                                entry.regular_market_price,
                                PROVIDER_ID,
                            )
                        })
                        .collect());
                }
                Err(e) => {
                    warn!("yahoo endpoint {endpoint} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(MarketDataError::AllProvidersEmpty))
    }
}
