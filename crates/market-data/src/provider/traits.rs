use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Quote, Symbol, SymbolKind};

/// A single upstream quote source.
///
/// Providers take a batch of canonical symbols and return whatever subset
/// they could resolve. `Ok(vec![])` is a routine outcome, not a failure:
/// the fallback chain interprets it as "ask the next provider". An `Err`
/// should be reserved for transport- or service-level faults, and even
/// then the chain absorbs it the same way.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Stable identifier, also used as the `source` tag on quotes.
    fn id(&self) -> &'static str;

    /// Ordering within the fallback chain; lower runs first.
    fn priority(&self) -> u8 {
        10
    }

    /// Asset kinds this provider can resolve. Symbols outside the
    /// coverage set are never routed to the provider.
    fn coverage(&self) -> &'static [SymbolKind];

    /// Fetches current quotes for the requested symbols. Unresolvable
    /// symbols are silently omitted from the result.
    async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError>;
}
