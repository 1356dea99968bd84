use chrono::Utc;
use serde::Serialize;

use super::Symbol;

/// A normalized price record, the only quote shape that leaves a provider.
///
/// `price` is the mid when both book sides are present, otherwise the last
/// traded or derived price. Prices are validated on construction: a `Quote`
/// never carries a non-finite or non-positive `price`.
#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    pub price: f64,
    /// Unix timestamp in milliseconds, assigned at normalization time.
    pub ts: i64,
    pub source: &'static str,
}

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Quote {
    /// Builds a quote from a single last/derived price. Returns `None`
    /// when the price is unusable (NaN, infinite, zero, or negative).
    pub fn from_last(symbol: Symbol, last: f64, source: &'static str) -> Option<Self> {
        if !usable(last) {
            return None;
        }
        Some(Self {
            symbol,
            bid: None,
            ask: None,
            price: last,
            ts: Utc::now().timestamp_millis(),
            source,
        })
    }

    /// Builds a quote from book sides with an optional last price.
    ///
    /// Unusable sides are dropped individually; the headline price is the
    /// mid when both sides survive, otherwise the last price. Returns
    /// `None` when no usable price can be formed at all.
    pub fn from_book(
        symbol: Symbol,
        bid: Option<f64>,
        ask: Option<f64>,
        last: Option<f64>,
        source: &'static str,
    ) -> Option<Self> {
        let bid = bid.filter(|v| usable(*v));
        let ask = ask.filter(|v| usable(*v));
        let price = match (bid, ask) {
            (Some(b), Some(a)) => (b + a) / 2.0,
            _ => last.filter(|v| usable(*v))?,
        };
        Some(Self {
            symbol,
            bid,
            ask,
            price,
            ts: Utc::now().timestamp_millis(),
            source,
        })
    }
}
