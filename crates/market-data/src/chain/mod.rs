//! Ordered provider fallback.
//!
//! The first provider in priority order is the primary and is asked for
//! the full symbol set. When the primary comes back empty (or fails, or
//! times out), the remaining providers are each asked only for the
//! symbols they cover that no earlier fallback has already resolved, and
//! their results are merged into one snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::models::{Quote, Symbol};
use crate::provider::QuoteProvider;

/// Upper bound on any single provider fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra primary attempts on a cold start, with backoff between them.
const COLD_START_DELAYS: [Duration; 2] = [Duration::from_millis(250), Duration::from_millis(750)];

pub struct FallbackChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
}

impl FallbackChain {
    /// Builds a chain, ordering providers by ascending priority.
    pub fn new(mut providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn QuoteProvider>] {
        &self.providers
    }

    /// Resolves a snapshot for a scheduled poll: single primary attempt,
    /// then fallbacks.
    pub async fn resolve(&self, symbols: &[Symbol]) -> Vec<Quote> {
        self.resolve_inner(symbols, &[]).await
    }

    /// Resolves a snapshot for a cold start, where an empty primary
    /// result is retried with short backoff before falling back.
    pub async fn resolve_cold_start(&self, symbols: &[Symbol]) -> Vec<Quote> {
        self.resolve_inner(symbols, &COLD_START_DELAYS).await
    }

    async fn resolve_inner(&self, symbols: &[Symbol], retry_delays: &[Duration]) -> Vec<Quote> {
        if symbols.is_empty() || self.providers.is_empty() {
            return vec![];
        }

        let primary = &self.providers[0];
        let requested = Self::covered_subset(primary.as_ref(), symbols, &HashSet::new());
        let mut quotes = self.attempt(primary.as_ref(), &requested).await;
        // retries only make sense when the primary was asked for something
        if !requested.is_empty() {
            for delay in retry_delays {
                if !quotes.is_empty() {
                    break;
                }
                tokio::time::sleep(*delay).await;
                quotes = self.attempt(primary.as_ref(), &requested).await;
            }
        }
        if !quotes.is_empty() {
            return quotes;
        }

        // primary exhausted; union the fallbacks over the uncovered rest
        let mut covered: HashSet<Symbol> = HashSet::new();
        let mut merged = Vec::new();
        for provider in &self.providers[1..] {
            let subset = Self::covered_subset(provider.as_ref(), symbols, &covered);
            if subset.is_empty() {
                continue;
            }
            let partial = self.attempt(provider.as_ref(), &subset).await;
            if partial.is_empty() {
                continue;
            }
            debug!(
                "fallback {} resolved {} of {} symbols",
                provider.id(),
                partial.len(),
                subset.len()
            );
            covered.extend(partial.iter().map(|q| q.symbol.clone()));
            merged.extend(partial);
        }
        merged
    }

    fn covered_subset(
        provider: &dyn QuoteProvider,
        symbols: &[Symbol],
        covered: &HashSet<Symbol>,
    ) -> Vec<Symbol> {
        symbols
            .iter()
            .filter(|s| provider.coverage().contains(&s.kind()) && !covered.contains(s))
            .cloned()
            .collect()
    }

    /// One bounded provider call; failures and timeouts collapse to an
    /// empty result so the chain keeps moving.
    async fn attempt(&self, provider: &dyn QuoteProvider, symbols: &[Symbol]) -> Vec<Quote> {
        if symbols.is_empty() {
            return vec![];
        }
        match tokio::time::timeout(FETCH_TIMEOUT, provider.fetch_snapshot(symbols)).await {
            Ok(Ok(quotes)) => quotes,
            Ok(Err(e)) => {
                warn!("provider {} failed: {e}", provider.id());
                vec![]
            }
            Err(_) => {
                warn!("provider {} timed out", provider.id());
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::errors::MarketDataError;
    use crate::models::SymbolKind;

    const ALL_KINDS: &[SymbolKind] = &[SymbolKind::Fx, SymbolKind::Crypto, SymbolKind::Metal];

    struct MockProvider {
        id: &'static str,
        priority: u8,
        coverage: &'static [SymbolKind],
        quotes: Vec<(&'static str, f64)>,
        fail: bool,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(
            id: &'static str,
            priority: u8,
            coverage: &'static [SymbolKind],
            quotes: Vec<(&'static str, f64)>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                coverage,
                quotes,
                fail: false,
                call_count: AtomicUsize::new(0),
            })
        }

        fn failing(id: &'static str, priority: u8) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                coverage: ALL_KINDS,
                quotes: vec![],
                fail: true,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn coverage(&self) -> &'static [SymbolKind] {
            self.coverage
        }

        async fn fetch_snapshot(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketDataError::ProviderError {
                    provider: self.id.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(self
                .quotes
                .iter()
                .filter(|(s, _)| symbols.iter().any(|req| req.as_str() == *s))
                .filter_map(|(s, price)| {
                    Quote::from_last(Symbol::new(s).unwrap(), *price, self.id)
                })
                .collect())
        }
    }

    fn syms(raw: &[&str]) -> Vec<Symbol> {
        raw.iter().map(|s| Symbol::new(s).unwrap()).collect()
    }

    #[tokio::test]
    async fn empty_providers_fall_through_in_order() {
        let a = MockProvider::new("A", 1, ALL_KINDS, vec![]);
        let b = MockProvider::new("B", 2, ALL_KINDS, vec![]);
        let c = MockProvider::new("C", 3, ALL_KINDS, vec![("EURUSD", 1.08)]);
        let chain = FallbackChain::new(vec![a.clone(), b.clone(), c.clone()]);

        let quotes = chain.resolve(&syms(&["EURUSD"])).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].source, "C");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn primary_success_stops_the_chain() {
        let a = MockProvider::new("A", 1, ALL_KINDS, vec![("EURUSD", 1.08)]);
        let b = MockProvider::new("B", 2, ALL_KINDS, vec![("EURUSD", 9.99)]);
        let chain = FallbackChain::new(vec![a.clone(), b.clone()]);

        let quotes = chain.resolve(&syms(&["EURUSD"])).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].source, "A");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn disjoint_fallbacks_are_unioned() {
        let primary = MockProvider::new("P", 1, ALL_KINDS, vec![]);
        let fx = MockProvider::new(
            "FX",
            2,
            &[SymbolKind::Fx],
            vec![("EURUSD", 1.08), ("GBPUSD", 1.27)],
        );
        let crypto = MockProvider::new("CRYPTO", 3, &[SymbolKind::Crypto], vec![("BTCUSD", 60_000.0)]);
        let chain = FallbackChain::new(vec![primary, fx, crypto]);

        let mut quotes = chain
            .resolve(&syms(&["EURUSD", "GBPUSD", "BTCUSD"]))
            .await;
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let got: Vec<(&str, &str)> = quotes
            .iter()
            .map(|q| (q.symbol.as_str(), q.source))
            .collect();
        assert_eq!(
            got,
            vec![("BTCUSD", "CRYPTO"), ("EURUSD", "FX"), ("GBPUSD", "FX")]
        );
    }

    #[tokio::test]
    async fn already_covered_symbols_are_not_refetched() {
        let primary = MockProvider::new("P", 1, ALL_KINDS, vec![]);
        let first = MockProvider::new("FIRST", 2, ALL_KINDS, vec![("EURUSD", 1.08)]);
        let second = MockProvider::new(
            "SECOND",
            3,
            ALL_KINDS,
            vec![("EURUSD", 9.99), ("GBPUSD", 1.27)],
        );
        let chain = FallbackChain::new(vec![primary, first, second.clone()]);

        let mut quotes = chain.resolve(&syms(&["EURUSD", "GBPUSD"])).await;
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assert_eq!(quotes[0].source, "FIRST");
        assert_eq!(quotes[1].source, "SECOND");
        assert_eq!(quotes[1].symbol.as_str(), "GBPUSD");
    }

    #[tokio::test]
    async fn provider_errors_are_absorbed() {
        let a = MockProvider::failing("A", 1);
        let b = MockProvider::new("B", 2, ALL_KINDS, vec![("EURUSD", 1.08)]);
        let chain = FallbackChain::new(vec![a, b]);

        let quotes = chain.resolve(&syms(&["EURUSD"])).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].source, "B");
    }

    #[tokio::test]
    async fn all_empty_resolves_to_empty() {
        let a = MockProvider::new("A", 1, ALL_KINDS, vec![]);
        let b = MockProvider::failing("B", 2);
        let chain = FallbackChain::new(vec![a, b]);

        assert!(chain.resolve(&syms(&["EURUSD"])).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_retries_the_primary_with_backoff() {
        let primary = MockProvider::new("P", 1, ALL_KINDS, vec![]);
        let chain = FallbackChain::new(vec![primary.clone()]);

        let quotes = chain.resolve_cold_start(&syms(&["EURUSD"])).await;
        assert!(quotes.is_empty());
        // one initial attempt plus one per backoff delay
        assert_eq!(primary.calls(), 1 + COLD_START_DELAYS.len());
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_skips_backoff_when_primary_covers_nothing() {
        let primary = MockProvider::new("P", 1, &[SymbolKind::Fx], vec![]);
        let crypto = MockProvider::new("CRYPTO", 2, &[SymbolKind::Crypto], vec![("BTCUSD", 60_000.0)]);
        let chain = FallbackChain::new(vec![primary.clone(), crypto]);

        let start = tokio::time::Instant::now();
        let quotes = chain.resolve_cold_start(&syms(&["BTCUSD"])).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].source, "CRYPTO");
        assert_eq!(primary.calls(), 0);
        // no backoff sleeps when there is nothing to retry
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn scheduled_resolve_does_not_retry() {
        let primary = MockProvider::new("P", 1, ALL_KINDS, vec![]);
        let chain = FallbackChain::new(vec![primary.clone()]);

        chain.resolve(&syms(&["EURUSD"])).await;
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn providers_are_sorted_by_priority() {
        let low = MockProvider::new("LOW", 9, ALL_KINDS, vec![]);
        let high = MockProvider::new("HIGH", 1, ALL_KINDS, vec![]);
        let chain = FallbackChain::new(vec![low, high]);

        let ids: Vec<&str> = chain.providers().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["HIGH", "LOW"]);
    }
}
