use serde::Deserialize;

/// Top-level envelope of the Yahoo v7 quote endpoint.
#[derive(Debug, Deserialize)]
pub struct QuoteResponseEnvelope {
    #[serde(rename = "quoteResponse")]
    pub quote_response: Option<QuoteResponseBody>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteResponseBody {
    #[serde(default)]
    pub result: Vec<QuoteResult>,
    pub error: Option<serde_json::Value>,
}

/// One instrument entry. Yahoo omits fields freely depending on asset
/// class and market hours, so everything price-shaped is optional.
#[derive(Debug, Deserialize)]
pub struct QuoteResult {
    pub symbol: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<f64>,
}
