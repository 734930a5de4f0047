//! Order book holding both sides, metadata, and initialization state.

use model::{BookMessage, Metadata, SnapshotPayload, UpdatePayload};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::level::PriceLevel;
use crate::side::{BookSide, Side, SideChanges};
use crate::snapshot::BookSnapshot;

/// Lifecycle of a book: it only accepts updates after its first snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookState {
    #[default]
    Uninitialized,
    Ready,
}

/// Result of dispatching one message against a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Both sides replaced.
    SnapshotLoaded {
        bids: usize,
        asks: usize,
        skipped: usize,
    },
    /// Deltas applied; `None` for a side the message did not touch.
    Updated {
        bids: Option<SideChanges>,
        asks: Option<SideChanges>,
    },
    /// Update received before any snapshot.
    Dropped,
}

impl MergeOutcome {
    /// Malformed records skipped while applying the message.
    pub fn skipped(&self) -> usize {
        match self {
            MergeOutcome::SnapshotLoaded { skipped, .. } => *skipped,
            MergeOutcome::Updated { bids, asks } => {
                bids.map_or(0, |c| c.skipped) + asks.map_or(0, |c| c.skipped)
            }
            MergeOutcome::Dropped => 0,
        }
    }
}

/// Local order book maintaining sorted, depth-bounded bid and ask levels.
///
/// Prices are exact `Decimal`s, so levels that differ beyond `f64` precision
/// stay distinct. Mutation needs `&mut self`; share a book across threads
/// through [`crate::BookMerger`].
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: BookSide,
    asks: BookSide,
    /// Non-level keys from the feed, kept verbatim.
    metadata: Metadata,
    state: BookState,
    /// Bumped by every change: applied messages and resets.
    sequence: u64,
}

impl OrderBook {
    /// Creates a new empty, uninitialized order book.
    pub fn new(symbol: impl Into<String>, max_depth: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BookSide::new(Side::Bid, max_depth),
            asks: BookSide::new(Side::Ask, max_depth),
            metadata: Metadata::new(),
            state: BookState::Uninitialized,
            sequence: 0,
        }
    }

    /// Returns the symbol this order book tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> BookState {
        self.state
    }

    /// Returns whether the order book has been initialized with a snapshot.
    pub fn is_initialized(&self) -> bool {
        self.state == BookState::Ready
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn max_depth(&self) -> usize {
        self.bids.max_depth()
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Dispatch a message to the snapshot loader or the delta applier.
    pub fn apply(&mut self, message: BookMessage) -> MergeOutcome {
        match message {
            BookMessage::Snapshot(snapshot) => self.load_snapshot(snapshot),
            BookMessage::Update(update) => self.apply_update(update),
        }
    }

    /// Replace both sides and the metadata from a snapshot.
    ///
    /// Nothing from the previous state survives. Moves the book to `Ready`.
    pub fn load_snapshot(&mut self, snapshot: SnapshotPayload) -> MergeOutcome {
        let skipped = self.bids.load(&snapshot.bids) + self.asks.load(&snapshot.asks);
        self.metadata = snapshot.metadata;
        self.state = BookState::Ready;
        self.sequence += 1;

        debug!(
            symbol = %self.symbol,
            bids = self.bids.len(),
            asks = self.asks.len(),
            skipped,
            "snapshot loaded"
        );

        MergeOutcome::SnapshotLoaded {
            bids: self.bids.len(),
            asks: self.asks.len(),
            skipped,
        }
    }

    /// Apply the side sections present in an update.
    ///
    /// Dropped while uninitialized. A side without a section is not touched.
    pub fn apply_update(&mut self, update: UpdatePayload) -> MergeOutcome {
        if !self.is_initialized() {
            debug!(symbol = %self.symbol, "update before snapshot dropped");
            return MergeOutcome::Dropped;
        }

        let bids = update.bids.map(|records| self.bids.apply_updates(&records));
        let asks = update.asks.map(|records| self.asks.apply_updates(&records));
        self.metadata.extend(update.metadata);
        self.sequence += 1;

        debug!(
            symbol = %self.symbol,
            bid_changes = bids.map_or(0, |c| c.applied()),
            ask_changes = asks.map_or(0, |c| c.applied()),
            "update applied"
        );

        MergeOutcome::Updated { bids, asks }
    }

    /// Returns the best (highest) bid price level.
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.best()
    }

    /// Returns the best (lowest) ask price level.
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.best()
    }

    /// Returns the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// Copy the current state into an immutable view.
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            state: self.state,
            sequence: self.sequence,
            bids: self.bids.levels().to_vec(),
            asks: self.asks.levels().to_vec(),
            metadata: self.metadata.clone(),
        }
    }

    /// Clears all data and resets the order book to uninitialized state.
    ///
    /// The sequence keeps counting so a reset view is never confused with an
    /// earlier one.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.metadata.clear();
        self.state = BookState::Uninitialized;
        self.sequence += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn message(payload: Value) -> BookMessage {
        BookMessage::from_value(payload).unwrap()
    }

    fn sides(book: &OrderBook) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        let pairs = |side: &BookSide| -> Vec<(Decimal, Decimal)> {
            side.levels().iter().map(|l| (l.price, l.volume)).collect()
        };
        (pairs(book.bids()), pairs(book.asks()))
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new("XBT/USD", 10);
        assert_eq!(book.symbol(), "XBT/USD");
        assert_eq!(book.state(), BookState::Uninitialized);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
        assert_eq!(book.sequence(), 0);
    }

    #[test]
    fn test_update_before_snapshot_is_dropped() {
        let mut book = OrderBook::new("XBT/USD", 10);

        let outcome = book.apply(message(json!({"b": [["10", "1", "1"]]})));

        assert_eq!(outcome, MergeOutcome::Dropped);
        assert_eq!(book.state(), BookState::Uninitialized);
        assert!(book.bids().is_empty());
        assert!(book.asks().is_empty());
        assert_eq!(book.sequence(), 0);
    }

    #[test]
    fn test_snapshot_then_dual_side_update() {
        let mut book = OrderBook::new("XBT/USD", 10);

        let snapshot = json!({"bids": [["10", "1"]], "asks": [["11", "1"]]});
        let outcome = book.apply(message(snapshot));
        assert_eq!(
            outcome,
            MergeOutcome::SnapshotLoaded {
                bids: 1,
                asks: 1,
                skipped: 0
            }
        );
        assert_eq!(book.state(), BookState::Ready);
        assert_eq!(
            sides(&book),
            (vec![(dec!(10), dec!(1))], vec![(dec!(11), dec!(1))])
        );

        book.apply(message(json!({"b": [["10", "0", "2"]], "a": [["11.5", "3", "2"]]})));

        assert_eq!(
            sides(&book),
            (
                vec![],
                vec![(dec!(11), dec!(1)), (dec!(11.5), dec!(3))]
            )
        );
        assert_eq!(book.sequence(), 2);
    }

    #[test]
    fn test_single_side_update_leaves_other_side() {
        let mut book = OrderBook::new("XBT/USD", 10);
        book.apply(message(json!({"bids": [["10", "1"]], "asks": [["11", "1", "5"]]})));
        let asks_before = book.asks().clone();

        let outcome = book.apply(message(json!({"b": [["9.5", "2", "6"]]})));

        match outcome {
            MergeOutcome::Updated { bids, asks } => {
                assert_eq!(bids.map(|c| c.inserted), Some(1));
                assert!(asks.is_none());
            }
            other => panic!("Expected Updated, got {other:?}"),
        }
        assert_eq!(book.asks(), &asks_before);
        assert_eq!(book.bids().len(), 2);
    }

    #[test]
    fn test_snapshot_sorts_unordered_input() {
        let mut book = OrderBook::new("XBT/USD", 10);
        book.apply(message(json!({
            "bids": [["98", "3"], ["100", "1"], ["99", "2"]],
            "asks": [["103", "3"], ["101", "1"], ["102", "2"]]
        })));

        let (bids, asks) = sides(&book);
        assert_eq!(
            bids.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
            vec![dec!(100), dec!(99), dec!(98)]
        );
        assert_eq!(
            asks.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
            vec![dec!(101), dec!(102), dec!(103)]
        );
    }

    #[test]
    fn test_snapshot_truncates_to_depth() {
        let mut book = OrderBook::new("XBT/USD", 2);
        book.apply(message(json!({
            "bids": [["100", "1"], ["99", "1"], ["98", "1"]],
            "asks": [["101", "1"], ["102", "1"], ["103", "1"]]
        })));

        let (bids, asks) = sides(&book);
        assert_eq!(bids, vec![(dec!(100), dec!(1)), (dec!(99), dec!(1))]);
        assert_eq!(asks, vec![(dec!(101), dec!(1)), (dec!(102), dec!(1))]);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let payload = json!({
            "bids": [["100", "1", "1"], ["99", "2", "1"]],
            "asks": [["101", "1", "1"]],
            "checksum": 42
        });
        let mut book = OrderBook::new("XBT/USD", 10);

        book.apply(message(payload.clone()));
        let first = book.snapshot();
        book.apply(message(json!({"b": [["98", "5", "2"]], "a": [["101", "0", "2"]]})));
        book.apply(message(payload));
        let second = book.snapshot();

        assert_eq!(first.bids, second.bids);
        assert_eq!(first.asks, second.asks);
        assert_eq!(first.metadata, second.metadata);
    }

    #[test]
    fn test_snapshot_missing_side_empties_it() {
        let mut book = OrderBook::new("XBT/USD", 10);
        book.apply(message(json!({"bids": [["10", "1"]], "asks": [["11", "1"]]})));

        book.apply(message(json!({"bids": [["9", "1"]]})));

        assert_eq!(book.bids().len(), 1);
        assert!(book.asks().is_empty());
        assert!(book.is_initialized());
    }

    #[test]
    fn test_malformed_snapshot_records_are_skipped() {
        let mut book = OrderBook::new("XBT/USD", 10);
        let outcome = book.apply(message(json!({
            "bids": [["10", "1"], ["bad"], ["9", "1"]],
            "asks": [{"price": "11"}, ["11", "1"]]
        })));

        assert_eq!(outcome.skipped(), 2);
        assert_eq!(book.bids().len(), 2);
        assert_eq!(book.asks().len(), 1);
    }

    #[test]
    fn test_metadata_replaced_by_snapshot_and_merged_by_update() {
        let mut book = OrderBook::new("XBT/USD", 10);
        let snapshot = json!({"bids": [], "asks": [], "checksum": 1, "channel": "book-10"});
        book.apply(message(snapshot));
        book.apply(message(json!({"a": [], "c": "974942666"})));

        assert_eq!(book.metadata()["checksum"], json!(1));
        assert_eq!(book.metadata()["c"], json!("974942666"));

        book.apply(message(json!({"bids": [], "asks": [], "checksum": 2})));

        assert_eq!(book.metadata().len(), 1);
        assert_eq!(book.metadata()["checksum"], json!(2));
    }

    #[test]
    fn test_high_precision_prices_preserved() {
        let mut book = OrderBook::new("XBT/USD", 10);
        book.apply(message(json!({
            "bids": [["100.1234567890123456789", "1"]],
            "asks": [["100.1234567890123456790", "1"]]
        })));

        assert_eq!(book.best_bid().unwrap().price, dec!(100.1234567890123456789));
        assert_eq!(book.best_ask().unwrap().price, dec!(100.1234567890123456790));
        assert_eq!(book.spread(), Some(dec!(0.0000000000000000001)));
    }

    #[test]
    fn test_clear() {
        let mut book = OrderBook::new("XBT/USD", 10);
        book.apply(message(
            json!({"bids": [["100", "1"]], "asks": [["101", "1"]], "checksum": 1}),
        ));
        assert!(book.is_initialized());
        let sequence = book.sequence();

        book.clear();

        assert!(!book.is_initialized());
        assert_eq!(book.sequence(), sequence + 1);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.metadata().is_empty());
        assert_eq!(
            book.apply(message(json!({"b": [["100", "1", "1"]]}))),
            MergeOutcome::Dropped
        );
    }
}
