//! In-memory snapshot cache and fan-out hub.
//!
//! The hub keeps the latest quote per symbol and pushes a full snapshot
//! frame to every subscriber on each merge. Subscribers that fall behind
//! lag on their broadcast receiver and simply resume with the next frame;
//! since every frame is a complete snapshot, nothing is lost.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Quote, Symbol};

/// Wire frame sent to every streaming subscriber: always the complete
/// current snapshot, never a delta.
#[derive(Clone, Debug, Serialize)]
pub struct SnapshotFrame {
    pub items: Vec<Quote>,
}

pub struct QuoteHub {
    quotes: RwLock<HashMap<Symbol, Quote>>,
    sender: broadcast::Sender<SnapshotFrame>,
}

impl Default for QuoteHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl QuoteHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            quotes: RwLock::new(HashMap::new()),
            sender,
        }
    }

    /// Upserts quotes into the cache. Later writes for the same symbol
    /// win; an empty batch is a no-op.
    pub fn merge(&self, quotes: Vec<Quote>) {
        if quotes.is_empty() {
            return;
        }
        let mut cache = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        for quote in quotes {
            cache.insert(quote.symbol.clone(), quote);
        }
    }

    /// Current snapshot, sorted by symbol for stable output.
    pub fn get_all(&self) -> Vec<Quote> {
        let cache = self.quotes.read().unwrap_or_else(|e| e.into_inner());
        let mut items: Vec<Quote> = cache.values().cloned().collect();
        items.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        items
    }

    pub fn is_empty(&self) -> bool {
        self.quotes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.quotes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Merges a batch and pushes the resulting full snapshot to all
    /// subscribers. A send error only means nobody is listening.
    pub fn broadcast(&self, quotes: Vec<Quote>) {
        self.merge(quotes);
        let frame = SnapshotFrame {
            items: self.get_all(),
        };
        let _ = self.sender.send(frame);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotFrame> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote::from_last(Symbol::new(symbol).unwrap(), price, "TEST").unwrap()
    }

    #[test]
    fn merge_then_read_round_trips() {
        let hub = QuoteHub::default();
        assert!(hub.is_empty());

        hub.merge(vec![quote("EURUSD", 1.08)]);
        assert_eq!(hub.len(), 1);
        assert_eq!(hub.get_all()[0].symbol.as_str(), "EURUSD");
    }

    #[test]
    fn empty_merge_is_a_no_op() {
        let hub = QuoteHub::default();
        hub.merge(vec![]);
        assert!(hub.is_empty());
    }

    #[test]
    fn last_write_wins_per_symbol() {
        let hub = QuoteHub::default();
        hub.merge(vec![quote("EURUSD", 1.08)]);
        hub.merge(vec![quote("EURUSD", 1.09)]);

        let items = hub.get_all();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, 1.09);
    }

    #[test]
    fn snapshot_is_sorted_by_symbol() {
        let hub = QuoteHub::default();
        hub.merge(vec![
            quote("XAUUSD", 2048.3),
            quote("BTCUSD", 60_000.0),
            quote("EURUSD", 1.08),
        ]);

        let items = hub.get_all();
        let symbols: Vec<&str> = items.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSD", "EURUSD", "XAUUSD"]);
    }

    #[tokio::test]
    async fn broadcast_delivers_the_full_snapshot() {
        let hub = QuoteHub::default();
        hub.merge(vec![quote("EURUSD", 1.08)]);
        let mut rx = hub.subscribe();

        hub.broadcast(vec![quote("BTCUSD", 60_000.0)]);

        let frame = rx.recv().await.unwrap();
        let symbols: Vec<&str> = frame.items.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSD", "EURUSD"]);
    }

    #[tokio::test]
    async fn dropped_subscribers_do_not_affect_others() {
        let hub = QuoteHub::default();
        let rx_dropped = hub.subscribe();
        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        drop(rx_dropped);
        hub.broadcast(vec![quote("EURUSD", 1.08)]);

        assert_eq!(rx.recv().await.unwrap().items.len(), 1);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn broadcast_without_subscribers_still_updates_the_cache() {
        let hub = QuoteHub::default();
        hub.broadcast(vec![quote("EURUSD", 1.08)]);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn frame_serializes_with_an_items_array() {
        let frame = SnapshotFrame {
            items: vec![quote("EURUSD", 1.08)],
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["items"][0]["symbol"], "EURUSD");
    }
}
